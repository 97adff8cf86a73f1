// SPDX-License-Identifier: MIT

//! Real modules and real named signals.
//!
//! The ignored tests need `cargo build` run in tests/hello-target first.

use std::ffi::OsString;

use super::util;
use crate::{
    classify::ErrorCode,
    config::HostConfig,
    launcher::{
        ContextFactory, ContextSpec, ModuleContextFactory, SandboxLauncher,
        signal_linux::FifoSignalSource,
    },
};

#[test]
#[ignore = "needs tests/hello-target built"]
fn hello_target_runs_in_context() {
    let base = tempfile::tempdir().unwrap();
    let config_path = base.path().join("hello-target.config");
    std::fs::write(&config_path, b"abcde").unwrap();

    let factory = ModuleContextFactory::new("sandbox_main", false);
    let mut context = factory
        .create(&ContextSpec {
            module_path: util::find_module("hello-target"),
            config_path: config_path.clone(),
            base_dir: base.path().to_path_buf(),
        })
        .unwrap();
    let code = context
        .execute(&[OsString::from("one"), OsString::from("two words")])
        .unwrap();
    drop(context);

    assert_eq!(code, 5);
    let out = std::fs::read_to_string(base.path().join("hello-target.out")).unwrap();
    assert_eq!(
        out,
        format!("config={}\narg=one\narg=two words\n", config_path.display())
    );
}

#[test]
#[ignore = "needs tests/hello-target built"]
fn unknown_entry_symbol_is_not_found() {
    let base = tempfile::tempdir().unwrap();
    let factory = ModuleContextFactory::new("no_such_entry", false);
    let err = factory
        .create(&ContextSpec {
            module_path: util::find_module("hello-target"),
            config_path: base.path().join("unused.config"),
            base_dir: base.path().to_path_buf(),
        })
        .err()
        .expect("symbol lookup must fail");
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
}

#[test]
fn missing_signal_is_not_found() {
    let signals = tempfile::tempdir().unwrap();
    let config = HostConfig {
        signal_dir: signals.path().to_path_buf(),
        confine: false,
        ..HostConfig::default()
    };
    let launcher = SandboxLauncher::for_platform(&config);

    let err = launcher
        .run(r#"never-created "/nonexistent/target.so""#, &[])
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
}

#[test]
fn set_signal_with_missing_target_is_not_found() {
    let signals = util::set_signal("ready");
    let config = HostConfig {
        signal_dir: signals.path().to_path_buf(),
        confine: false,
        ..HostConfig::default()
    };
    let launcher = SandboxLauncher::new(
        Box::new(FifoSignalSource::new(config.signal_dir.clone())),
        Box::new(ModuleContextFactory::new(&config.entry_symbol, config.confine)),
    );

    let err = launcher
        .run(r#"ready "/nonexistent/target.so""#, &[])
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
}
