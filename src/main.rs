fn main() {
    if let Err(err) = pipecheck_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
