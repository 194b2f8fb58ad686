/*
 * Copyright (C) 2020 Oakes, Gregory <gregoryoakes@fastmail.com>
 * Author: Oakes, Gregory <gregory.oakes@fastmail.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use std::{env, process};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use studysprout::{db, Config, Error};

const USAGE: &str = "usage: studysprout [init|reset]";

#[derive(Debug, Clone, Copy)]
enum Command {
    /// Create missing tables.
    Init,
    /// Drop all tables and recreate them empty.
    Reset,
}

impl Command {
    fn parse(arg: Option<&str>) -> Option<Command> {
        match arg {
            None | Some("init") => Some(Command::Init),
            Some("reset") => Some(Command::Reset),
            _ => None,
        }
    }
}

async fn run(command: Command) -> Result<(), Error> {
    let config = Config::from_env()?;
    let db_pool = db::create_pool(&config)?;
    if let Command::Reset = command {
        db::uninit_db(&db_pool).await?;
    }
    db::init_db(&db_pool).await?;
    info!(?command, "done");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let arg = env::args().nth(1);
    let command = match Command::parse(arg.as_deref()) {
        Some(command) => command,
        None => {
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    };
    if let Err(e) = run(command).await {
        error!("{}", e);
        process::exit(1);
    }
}
