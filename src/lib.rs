//! An engine and server for running olympiads: multi-event tournaments
//! with players, squads, seeded brackets, and staged competition.
//!
//! An olympiad owns players, teams, and events. Every event runs as an
//! ordered chain of stages (groups, round robin, or single elimination);
//! finishing the last match of a stage settles its ranking and feeds the
//! qualifiers into the next stage, until the final stage finishes the
//! event. Mutations are guarded by a four digit pin and per row version
//! numbers, so two scorekeepers cannot silently overwrite each other.
//!
//! The `olympiad-server` binary serves the engine over a line based TCP
//! protocol: one request line in, one reply line out, structured payloads
//! as RON.

// This file is part of olympiad.
//
// olympiad is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// olympiad is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

#![deny(clippy::panic)]

use std::{
    io::{BufRead, BufReader, Write},
    net::TcpStream,
};

pub mod bracket;
pub mod engine;
pub mod error;
pub mod event;
pub mod matches;
pub mod olympiad;
pub mod pin;
pub mod player;
pub mod stage;
pub mod store;
pub mod team;
pub mod utils;
pub mod version;

pub const HOME: &str = "olympiad";
pub const SERVER_PORT: &str = ":49172";
pub const VERSION_ID: &str = "b3e07a91";

pub const COPYRIGHT: &str = r".SH COPYRIGHT
Copyright (C) 2026 The olympiad developers

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU Affero General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU Affero General Public License for more details.

You should have received a copy of the GNU Affero General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
";

pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "
Copyright (c) 2026 The olympiad developers
Licensed under the AGPLv3"
);

/// # Errors
///
/// If read fails.
pub fn read_response(reader: &mut BufReader<TcpStream>) -> anyhow::Result<String> {
    let mut reply = String::new();
    reader.read_line(&mut reply)?;
    print!("<- {reply}");
    Ok(reply)
}

/// # Errors
///
/// If write fails.
pub fn write_command(command: &str, stream: &mut TcpStream) -> anyhow::Result<()> {
    print!("-> {command}");
    stream.write_all(command.as_bytes())?;
    Ok(())
}
