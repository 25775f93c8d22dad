use std::process;

fn main() {
    if let Err(e) = dunner::cli::run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
