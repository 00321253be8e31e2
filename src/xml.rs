//! Coefficient rule document and its XML rendering.
//!
//! ```xml
//! <service type="transport">
//!     <coefficients>
//!         <coefficient value="1.35">
//!             <conditions>
//!                 <ifAll>
//!                     <property name="item.brand">VOLVO</property>
//!                     <property name="item.model">XC60</property>
//!                 </ifAll>
//!             </conditions>
//!         </coefficient>
//!         <coefficient value="1.0"/>
//!     </coefficients>
//! </service>
//! ```
//!
//! The unconditional fallback node is appended by the constructor and is
//! always the last coefficient.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::info;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{
    cli::XmlArgs,
    console::{self, Tone},
    dedup::{self, CoefficientRecord},
    encoding::EncodingChoice,
    error::ConsolidateError,
    io_utils,
    report::ValidationReport,
    sheet::{self, SourceKind, format_float},
};

pub const SERVICE_TYPE: &str = "transport";
pub const FALLBACK_COEFFICIENT: &str = "1.0";
pub const BRAND_PROPERTY: &str = "item.brand";
pub const MODEL_PROPERTY: &str = "item.model";

const INDENT_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlStyle {
    #[default]
    Pretty,
    Compact,
}

/// A `property` test inside an `ifAll` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyCondition {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientRule {
    pub value: String,
    /// All must hold; empty means unconditional.
    pub conditions: Vec<PropertyCondition>,
}

impl CoefficientRule {
    pub fn is_unconditional(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDocument {
    service_type: String,
    rules: Vec<CoefficientRule>,
}

impl RuleDocument {
    pub fn from_records(records: &[CoefficientRecord]) -> Self {
        let mut rules = records
            .iter()
            .map(|record| CoefficientRule {
                value: format_float(record.coefficient),
                conditions: vec![
                    PropertyCondition {
                        name: BRAND_PROPERTY.to_string(),
                        value: record.brand.clone(),
                    },
                    PropertyCondition {
                        name: MODEL_PROPERTY.to_string(),
                        value: record.model.clone(),
                    },
                ],
            })
            .collect::<Vec<_>>();
        rules.push(CoefficientRule {
            value: FALLBACK_COEFFICIENT.to_string(),
            conditions: Vec::new(),
        });
        Self {
            service_type: SERVICE_TYPE.to_string(),
            rules,
        }
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Every coefficient node, fallback last.
    pub fn rules(&self) -> &[CoefficientRule] {
        &self.rules
    }

    pub fn keyed_rules(&self) -> &[CoefficientRule] {
        &self.rules[..self.rules.len() - 1]
    }

    pub fn fallback(&self) -> &CoefficientRule {
        &self.rules[self.rules.len() - 1]
    }

    pub fn render(&self, style: XmlStyle) -> Result<String, ConsolidateError> {
        let mut writer = match style {
            XmlStyle::Pretty => Writer::new_with_indent(Vec::new(), b' ', INDENT_WIDTH),
            XmlStyle::Compact => Writer::new(Vec::new()),
        };

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        if style == XmlStyle::Compact {
            emit(&mut writer, Event::Text(BytesText::new("\n")))?;
        }

        let mut service = BytesStart::new("service");
        service.push_attribute(("type", self.service_type.as_str()));
        emit(&mut writer, Event::Start(service))?;
        emit(&mut writer, Event::Start(BytesStart::new("coefficients")))?;

        for rule in &self.rules {
            let mut node = BytesStart::new("coefficient");
            node.push_attribute(("value", rule.value.as_str()));
            if rule.is_unconditional() {
                emit(&mut writer, Event::Empty(node))?;
                continue;
            }
            emit(&mut writer, Event::Start(node))?;
            emit(&mut writer, Event::Start(BytesStart::new("conditions")))?;
            emit(&mut writer, Event::Start(BytesStart::new("ifAll")))?;
            for condition in &rule.conditions {
                let mut property = BytesStart::new("property");
                property.push_attribute(("name", condition.name.as_str()));
                emit(&mut writer, Event::Start(property))?;
                emit(&mut writer, Event::Text(BytesText::new(&condition.value)))?;
                emit(&mut writer, Event::End(BytesEnd::new("property")))?;
            }
            emit(&mut writer, Event::End(BytesEnd::new("ifAll")))?;
            emit(&mut writer, Event::End(BytesEnd::new("conditions")))?;
            emit(&mut writer, Event::End(BytesEnd::new("coefficient")))?;
        }

        emit(&mut writer, Event::End(BytesEnd::new("coefficients")))?;
        emit(&mut writer, Event::End(BytesEnd::new("service")))?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|err| ConsolidateError::Xml(err.to_string()))
    }

    /// Renders and overwrites `path`, creating its directory if needed.
    pub fn write(&self, path: &Path, style: XmlStyle) -> Result<(), ConsolidateError> {
        let rendered = self.render(style)?;
        io_utils::ensure_parent_dir(path)?;
        fs::write(path, rendered).map_err(|err| ConsolidateError::io(path, err))
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), ConsolidateError> {
    writer
        .write_event(event)
        .map_err(|err| ConsolidateError::Xml(err.to_string()))
}

pub fn execute(args: &XmlArgs) -> Result<()> {
    console::announce(Tone::Progress, "Reading file...");
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = match SourceKind::of(&args.input) {
        SourceKind::Spreadsheet => encoding_rs::UTF_8,
        SourceKind::Delimited => EncodingChoice::from_label(args.input_encoding.as_deref())?
            .resolve(&args.input)
            .with_context(|| format!("Resolving encoding of {:?}", args.input))?,
    };
    let table = sheet::read_table(&args.input, delimiter, encoding)
        .with_context(|| format!("Reading {:?}", args.input))?;

    console::announce(Tone::Progress, "Validating file contents...");
    let outcome = match dedup::dedup_coefficients(&table) {
        Ok(outcome) => outcome,
        Err(err) => {
            let report = ValidationReport::from_error(&err);
            if let Some(report) = &report {
                console::announce(Tone::Error, "Errors were detected:");
                console::announce_report(report);
                save_report(args.report_json.as_deref(), report)?;
            }
            console::announce(Tone::Error, "No XML generated due to errors.");
            let rows_processed = match &err {
                ConsolidateError::ValidationFailed { rows_processed, .. } => *rows_processed,
                _ => table.len(),
            };
            console::announce(
                Tone::Error,
                &format!(
                    "Summary: rows processed: {rows_processed} | errors: {} | duplicates dropped: 0",
                    report.as_ref().map_or(1, ValidationReport::error_count)
                ),
            );
            return Err(err.into());
        }
    };

    if outcome.duplicates_dropped > 0 {
        console::announce_report(&outcome.report);
        console::announce(
            Tone::Warning,
            &format!("Safe duplicates dropped: {}", outcome.duplicates_dropped),
        );
    }
    save_report(args.report_json.as_deref(), &outcome.report)?;

    console::announce(Tone::Progress, "Generating XML...");
    let document = RuleDocument::from_records(&outcome.records);
    let style = if args.compact {
        XmlStyle::Compact
    } else {
        XmlStyle::Pretty
    };
    document
        .write(&args.output, style)
        .with_context(|| format!("Writing XML to {:?}", args.output))?;
    info!(
        "Wrote {} coefficient node(s) to {:?}",
        document.rules().len(),
        args.output
    );
    console::announce(
        Tone::Success,
        &format!("XML generated successfully at {}", args.output.display()),
    );
    console::announce(
        Tone::Progress,
        &format!(
            "Summary: rows processed: {} | errors: 0 | duplicates dropped: {}",
            outcome.rows_processed, outcome.duplicates_dropped
        ),
    );
    Ok(())
}

fn save_report(path: Option<&Path>, report: &ValidationReport) -> Result<()> {
    if let Some(path) = path {
        report
            .save_json(path)
            .with_context(|| format!("Writing report to {path:?}"))?;
    }
    Ok(())
}
