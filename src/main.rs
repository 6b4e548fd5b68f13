fn main() {
    if let Err(e) = badgectl::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
