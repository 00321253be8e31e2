fn main() {
    if let Err(err) = sheet_consolidate::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
