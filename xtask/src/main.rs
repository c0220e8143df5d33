//! Drives both workspaces: the host library at the root and the firmware in
//! `cross/`.
//!
//! ```txt
//! cargo xtask build [host|firmware]
//! cargo xtask test
//! cargo xtask lint
//! cargo xtask flash
//! cargo xtask <cargo args...> [host|firmware]
//! ```
use std::{env, path::PathBuf};

use anyhow::{bail, Error};
use xshell::cmd;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy)]
enum Workspace {
    Host,
    Firmware,
}

impl Workspace {
    const ALL: [Workspace; 2] = [Workspace::Host, Workspace::Firmware];

    fn parse(name: &str) -> Option<Self> {
        match name {
            "host" => Some(Workspace::Host),
            "firmware" | "target" => Some(Workspace::Firmware),
            _ => None,
        }
    }

    fn dir(self) -> PathBuf {
        match self {
            Workspace::Host => root_dir(),
            Workspace::Firmware => root_dir().join("cross"),
        }
    }

    fn cargo(self, args: &[&str]) -> Result<()> {
        let _p = xshell::pushd(self.dir())?;
        println!("{self:?}: cargo {}", args.join(" "));
        cmd!("cargo {args...}").run()?;
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let args = args.iter().map(String::as_str).collect::<Vec<_>>();

    match &args[..] {
        [] => bail!("usage: cargo xtask <build|test|lint|flash|cargo args...> [host|firmware]"),
        ["build"] => {
            Workspace::Host.cargo(&["build"])?;
            Workspace::Firmware.cargo(&["build", "--release"])
        }
        ["test"] | ["test", "host"] => Workspace::Host.cargo(&["test"]),
        ["lint"] => {
            Workspace::Host.cargo(&["clippy", "--all-targets"])?;
            Workspace::Host.cargo(&["clippy", "-p", "airzone", "--features", "defmt"])?;
            Workspace::Firmware.cargo(&["clippy", "--release"])
        }
        ["flash"] => Workspace::Firmware.cargo(&["run", "--release"]),
        [rest @ .., last] => match Workspace::parse(last) {
            Some(workspace) => workspace.cargo(rest),
            None => Workspace::ALL
                .iter()
                .try_for_each(|workspace| workspace.cargo(&args)),
        },
    }
}

fn root_dir() -> PathBuf {
    let mut xtask_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    xtask_dir.pop();
    xtask_dir
}
