fn main() {
    if let Err(err) = sqlchain::run_entry() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
