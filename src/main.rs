fn main() {
    if let Err(e) = docqa_lib::run() {
        eprintln!("docqa: {e}");
        std::process::exit(1);
    }
}
