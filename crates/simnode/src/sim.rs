fn main() {
    if let Err(err) = memwallet_simnode::cli::run_entry() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
