use super::super::args::{Cli, Command};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Tick(args) => super::tick::run(args).await,
        Command::Status(args) => super::status::run(args),
    }
}
