fn main() {
    if let Err(e) = life_alert_lib::run() {
        eprintln!("life-alert: {e}");
        std::process::exit(1);
    }
}
