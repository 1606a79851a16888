//! Exercises the full `config::resolve` pipeline — config-script, env, and
//! CLI layers stacked in precedence order — rather than the resolver's own
//! unit tests, which poke individual layers in isolation.

use cserve::config::{Cli, RouteSpec};
use std::io::Write;

fn empty_cli() -> Cli {
    Cli {
        config: None,
        port: None,
        sslport: None,
        sslcert: None,
        sslkey: None,
        nthreads: None,
        userid: None,
        tmpdir: None,
        scriptdir: None,
        initscript: None,
        keepalive: None,
        maxpost: None,
        jwtkey: None,
        loglevel: None,
        routes: Vec::new(),
        plugins: Vec::new(),
    }
}

#[test]
fn cli_flags_win_over_everything_beneath_them() {
    let dir = std::env::temp_dir().join(format!("cserve-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config_path = dir.join("cserve-config-flags.conf");
    std::fs::File::create(&config_path).unwrap().write_all(b"port: 9090\n").unwrap();

    unsafe { std::env::set_var("CSERVE_PORT", "7070") };
    let mut cli = empty_cli();
    cli.config = Some(config_path.to_string_lossy().into_owned());
    cli.port = Some(6060);

    let resolved = cserve::config::resolve(&cli).unwrap();
    assert_eq!(resolved.port, 6060);
    unsafe { std::env::remove_var("CSERVE_PORT") };
}

#[test]
fn env_wins_over_the_config_script_when_no_cli_flag_is_given() {
    let dir = std::env::temp_dir().join(format!("cserve-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config_path = dir.join("cserve-config-env.conf");
    std::fs::File::create(&config_path).unwrap().write_all(b"port: 9090\n").unwrap();

    unsafe { std::env::set_var("CSERVE_PORT", "7070") };
    let mut cli = empty_cli();
    cli.config = Some(config_path.to_string_lossy().into_owned());

    let resolved = cserve::config::resolve(&cli).unwrap();
    assert_eq!(resolved.port, 7070);
    unsafe { std::env::remove_var("CSERVE_PORT") };
}

#[test]
fn falls_back_to_declared_defaults_with_nothing_supplied() {
    let resolved = cserve::config::resolve(&empty_cli()).unwrap();
    assert_eq!(resolved.port, 8080);
    assert_eq!(resolved.nthreads, 4);
    assert!(resolved.sslport.is_none());
    assert!(resolved.routes.is_empty());
}

#[test]
fn cli_route_list_is_split_and_parsed() {
    let mut cli = empty_cli();
    cli.routes = vec!["GET:/:index.lua".to_string(), "POST:/submit:submit.lua".to_string()];

    let resolved = cserve::config::resolve(&cli).unwrap();
    assert_eq!(
        resolved.routes,
        vec![
            RouteSpec { method: "GET".into(), path: "/".into(), target: "index.lua".into() },
            RouteSpec { method: "POST".into(), path: "/submit".into(), target: "submit.lua".into() },
        ]
    );
}

#[test]
fn maxpost_accepts_a_data_size_suffix_from_the_cli() {
    let mut cli = empty_cli();
    cli.maxpost = Some("2MB".to_string());

    let resolved = cserve::config::resolve(&cli).unwrap();
    assert_eq!(resolved.maxpost, 2 * 1024 * 1024);
}
