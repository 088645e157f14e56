fn main() {
    if let Err(e) = flowmon_lib::run() {
        eprintln!("flowmon: {}", e);
        std::process::exit(1);
    }
}
