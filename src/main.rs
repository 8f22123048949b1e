fn main() {
    if let Err(err) = aneel_uc_loader::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
