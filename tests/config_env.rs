// Environment overrides; kept in its own binary since it mutates the process environment
use cqlbridge::options::Settings;
use cqlbridge::Consistency;
use std::io::Write;

#[test]
fn environment_overrides_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(b"[server]\nhost = \"file-host\"\nport = 9999\n").unwrap();
    file.flush().unwrap();

    // SAFETY: the only test in this binary
    unsafe {
        std::env::set_var("CQLBRIDGE_SERVER__PORT", "9142");
        std::env::set_var("CQLBRIDGE_SERVER__CONSISTENCY", "local_one");
    }
    let config = Settings::load(Some(file.path())).unwrap().connection_config();
    unsafe {
        std::env::remove_var("CQLBRIDGE_SERVER__PORT");
        std::env::remove_var("CQLBRIDGE_SERVER__CONSISTENCY");
    }

    assert_eq!(config.hosts, vec!["file-host"]);
    assert_eq!(config.port, 9142);
    assert_eq!(config.consistency, Consistency::LocalOne);
}
