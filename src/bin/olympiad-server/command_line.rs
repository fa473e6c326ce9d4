// This file is part of olympiad.
//
// olympiad is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// olympiad is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for
// more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with olympiad. If not, see <https://www.gnu.org/licenses/>.

use std::io::Write as _;

use clap::{CommandFactory, Parser};
use olympiad::{COPYRIGHT, LONG_VERSION};

/// Olympiad Server
///
/// This is a TCP server that runs multi-event olympiads for its clients.
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug)]
#[command(long_version = LONG_VERSION, about = "Olympiad Server")]
pub(crate) struct Args {
    /// Whether to log on the debug level
    #[arg(long)]
    pub debug: bool,

    /// Whether to skip loading and saving the data file
    #[arg(long)]
    pub skip_the_data_file: bool,

    /// Whether the application is being run by systemd
    #[arg(long)]
    pub systemd: bool,

    /// Build the manpage
    #[arg(long)]
    pub man: bool,
}

impl Args {
    pub(crate) fn generate_man_page() -> anyhow::Result<()> {
        let mut buffer: Vec<u8> = Vec::default();
        let cmd = Self::command().name("olympiad-server").long_version(None);
        let man = clap_mangen::Man::new(cmd).date("2026-07-14");

        man.render(&mut buffer)?;
        write!(buffer, "{COPYRIGHT}")?;

        std::fs::write("olympiad-server.1", buffer)?;
        Ok(())
    }
}
