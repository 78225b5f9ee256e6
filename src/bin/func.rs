use funcvm::arbiter::require_effective_version;
use funcvm::config::{Config, VERSION_ENV_VAR};
use funcvm::error::Result;
use funcvm::platform::PlatformDescriptor;
use funcvm::shim::{forward, resolve_binary, IDENTIFY_FLAG};
use funcvm::store::VersionStore;
use funcvm::utils::print_error;
use std::ffi::OsString;

fn main() {
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();

    if args.first().is_some_and(|a| a == IDENTIFY_FLAG) {
        println!("yes");
        return;
    }

    funcvm::init_logging();

    match dispatch(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&e.to_string());
            std::process::exit(1);
        }
    }
}

fn dispatch(args: &[OsString]) -> Result<i32> {
    let config = Config::load()?;
    let platform = PlatformDescriptor::current()?;
    let store = VersionStore::new(config.download_dir.clone());

    let env_version = std::env::var(VERSION_ENV_VAR).ok();
    let working_dir = std::env::current_dir()?;

    let active = require_effective_version(env_version.as_deref(), &working_dir, &store)?;
    let binary = resolve_binary(&store, &platform, &active)?;
    forward(&binary, args)
}
