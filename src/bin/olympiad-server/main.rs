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

//! The olympiad server. Clients connect over TCP, prove they speak the same
//! protocol revision, and then issue one line per request. Every request gets
//! exactly one reply line, `= verb ...` on success and `? verb kind: reason`
//! on failure.

#![deny(clippy::expect_used)]
#![deny(clippy::indexing_slicing)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]

mod command_line;

use std::{
    fmt,
    fs::{self, File},
    io::{BufRead, BufReader, ErrorKind, Write},
    net::{TcpListener, TcpStream},
    process::exit,
    str::FromStr,
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::Duration,
};

use clap::Parser;
use log::{debug, error, info};
use olympiad::{
    SERVER_PORT, VERSION_ID,
    engine::Engine,
    error::EngineError,
    event::{EventId, EventSpec},
    matches::MatchId,
    olympiad::OlympiadId,
    pin::Pin,
    player::PlayerId,
    team::{TeamId, TeamSpec},
    utils::{self, data_file},
    version::Version,
};

use crate::command_line::Args;

const DATA_FILE: &str = "olympiads.ron";
const HOUR_IN_SECONDS: u64 = 60 * 60;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    utils::init_logger(args.debug, args.systemd);

    if args.man {
        return Args::generate_man_page();
    }

    let (tx, rx): (
        Sender<(String, Option<Sender<String>>)>,
        Receiver<(String, Option<Sender<String>>)>,
    ) = mpsc::channel();

    let mut server = Server {
        skip_the_data_file: args.skip_the_data_file,
        ..Server::default()
    };

    if !args.skip_the_data_file {
        server.load_data_file()?;
    }

    ctrlc::set_handler({
        let tx = tx.clone();
        let systemd = args.systemd;
        move || {
            if !systemd {
                println!();
            }
            handle_error(tx.send(("0 save".to_string(), None)));
            handle_error(tx.send(("0 exit".to_string(), None)));
        }
    })?;

    Server::save(tx.clone());

    thread::spawn(move || handle_error(server.handle_messages(&rx)));

    let mut address = "[::]".to_string();
    address.push_str(SERVER_PORT);

    let listener = match TcpListener::bind(&address) {
        Ok(listener) => listener,
        Err(error) => {
            error!("TcpListener::bind: {error}");

            address = "0.0.0.0".to_string();
            address.push_str(SERVER_PORT);
            TcpListener::bind(&address)?
        }
    };
    info!("listening for clients at {address} ...");

    for (index, stream) in (1..).zip(listener.incoming()) {
        let stream = match stream {
            Ok(stream) => stream,
            Err(error) => {
                error!("stream: {error}");
                continue;
            }
        };

        let tx = tx.clone();
        thread::spawn(move || {
            if let Err(error) = serve_connection(index, stream, &tx) {
                debug!("{index} hung up: {error}");
            }
        });
    }

    Ok(())
}

/// Runs the request and reply loop for one client after checking that it
/// speaks the same protocol revision.
fn serve_connection(
    index: u64,
    mut stream: TcpStream,
    tx: &Sender<(String, Option<Sender<String>>)>,
) -> anyhow::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut buf = String::new();

    reader.read_line(&mut buf)?;
    if buf.split_ascii_whitespace().next() == Some(VERSION_ID) {
        stream.write_all(b"= version\n")?;
    } else {
        stream.write_all(b"? version validation: wrong version id\n")?;
        return Err(anyhow::Error::msg("wrong version id"));
    }
    buf.clear();

    debug!("{index} connected");
    let (tx_reply, rx_reply) = mpsc::channel();

    for _ in 0..1_000_000 {
        if reader.read_line(&mut buf)? == 0 {
            break;
        }

        let request = buf.trim();
        if request.is_empty() || request.chars().any(char::is_control) {
            break;
        }

        tx.send((format!("{index} {request}"), Some(tx_reply.clone())))?;

        let mut reply = rx_reply.recv()?;
        reply.push('\n');
        stream.write_all(reply.as_bytes())?;
        buf.clear();
    }

    debug!("{index} disconnected");
    Ok(())
}

#[derive(Default)]
struct Server {
    engine: Engine,
    skip_the_data_file: bool,
}

impl Server {
    /// Answers requests one at a time, in the order they arrived. All state
    /// lives on this thread, so no request ever sees another one half done.
    fn handle_messages(
        &mut self,
        rx: &Receiver<(String, Option<Sender<String>>)>,
    ) -> anyhow::Result<()> {
        loop {
            let (message, option_tx) = rx.recv()?;
            let mut words = message.split_ascii_whitespace();

            let index = words.next().unwrap_or_default();
            let Some(verb) = words.next() else {
                continue;
            };

            if index == "0" {
                match verb {
                    "save" => {
                        debug!("saving the data file...");
                        self.save_data_file();
                    }
                    "exit" => {
                        info!("exiting...");
                        exit(0);
                    }
                    _ => error!("unrecognized internal message: {verb}"),
                }
                continue;
            }

            debug!("{index} {verb}");
            let rest: Vec<&str> = words.collect();
            let reply = match self.dispatch(verb, &rest) {
                Ok(payload) if payload.is_empty() => format!("= {verb}"),
                Ok(payload) => format!("= {verb} {payload}"),
                Err(reason) => format!("? {verb} {reason}"),
            };

            if let Some(tx) = option_tx {
                let _ok = tx.send(reply);
            }
        }
    }

    /// Maps one request line onto the engine. `Ok` is the payload after
    /// `= verb`, `Err` is the `kind: reason` tail after `? verb`.
    #[allow(clippy::too_many_lines)]
    fn dispatch(&mut self, verb: &str, rest: &[&str]) -> Result<String, String> {
        match verb {
            "stage_kinds" => to_ron(&Engine::stage_kinds()),
            "list_olympiads" => to_ron(&self.engine.list_olympiads()),
            "show_olympiad" => {
                let id = parse(rest.first())?;
                to_ron(&self.engine.show_olympiad(id).map_err(fault)?)
            }
            "create_olympiad" => {
                let pin = match rest.first() {
                    Some(&"_") => None,
                    word => Some(parse(word)?),
                };
                let name = tail(rest, 1);

                let created = self.engine.create_olympiad(&name, pin).map_err(fault)?;
                to_ron(&created)
            }
            "rename_olympiad" => {
                let id: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let expected: Version = parse(rest.get(2))?;
                let name = tail(rest, 3);

                let version = self
                    .engine
                    .rename_olympiad(id, &pin, expected, &name)
                    .map_err(fault)?;
                Ok(version.to_string())
            }
            "delete_olympiad" => {
                let id: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let expected: Version = parse(rest.get(2))?;

                self.engine.delete_olympiad(id, &pin, expected).map_err(fault)?;
                Ok(String::new())
            }
            "create_player" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let expected: Version = parse(rest.get(2))?;
                let name = tail(rest, 3);

                let created = self
                    .engine
                    .create_player(olympiad, &pin, expected, &name)
                    .map_err(fault)?;
                to_ron(&created)
            }
            "rename_player" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let id: PlayerId = parse(rest.get(2))?;
                let expected: Version = parse(rest.get(3))?;
                let name = tail(rest, 4);

                let version = self
                    .engine
                    .rename_player(olympiad, &pin, id, expected, &name)
                    .map_err(fault)?;
                Ok(version.to_string())
            }
            "delete_player" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let id: PlayerId = parse(rest.get(2))?;
                let expected: Version = parse(rest.get(3))?;

                self.engine
                    .delete_player(olympiad, &pin, id, expected)
                    .map_err(fault)?;
                Ok(String::new())
            }
            "list_players" => {
                let olympiad = parse(rest.first())?;
                to_ron(&self.engine.list_players(olympiad).map_err(fault)?)
            }
            "create_team" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let expected: Version = parse(rest.get(2))?;
                let spec: TeamSpec = from_ron(&tail(rest, 3))?;

                let created = self
                    .engine
                    .create_team(olympiad, &pin, expected, &spec)
                    .map_err(fault)?;
                to_ron(&created)
            }
            "rename_team" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let id: TeamId = parse(rest.get(2))?;
                let expected: Version = parse(rest.get(3))?;
                let name = tail(rest, 4);

                let version = self
                    .engine
                    .rename_team(olympiad, &pin, id, expected, &name)
                    .map_err(fault)?;
                Ok(version.to_string())
            }
            "delete_team" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let id: TeamId = parse(rest.get(2))?;
                let expected: Version = parse(rest.get(3))?;

                self.engine
                    .delete_team(olympiad, &pin, id, expected)
                    .map_err(fault)?;
                Ok(String::new())
            }
            "list_teams" => {
                let olympiad = parse(rest.first())?;
                to_ron(&self.engine.list_teams(olympiad).map_err(fault)?)
            }
            "create_event" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let expected: Version = parse(rest.get(2))?;
                let spec: EventSpec = from_ron(&tail(rest, 3))?;

                let detail = self
                    .engine
                    .create_event(olympiad, &pin, expected, &spec)
                    .map_err(fault)?;
                to_ron(&detail)
            }
            "rename_event" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let id: EventId = parse(rest.get(2))?;
                let expected: Version = parse(rest.get(3))?;
                let name = tail(rest, 4);

                let version = self
                    .engine
                    .rename_event(olympiad, &pin, id, expected, &name)
                    .map_err(fault)?;
                Ok(version.to_string())
            }
            "delete_event" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let id: EventId = parse(rest.get(2))?;
                let expected: Version = parse(rest.get(3))?;

                self.engine
                    .delete_event(olympiad, &pin, id, expected)
                    .map_err(fault)?;
                Ok(String::new())
            }
            "list_events" => {
                let olympiad = parse(rest.first())?;
                to_ron(&self.engine.list_events(olympiad).map_err(fault)?)
            }
            "show_event" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let id: EventId = parse(rest.get(1))?;
                to_ron(&self.engine.event_detail(olympiad, id).map_err(fault)?)
            }
            "submit_score" => {
                let olympiad: OlympiadId = parse(rest.first())?;
                let pin: Pin = parse(rest.get(1))?;
                let match_id: MatchId = parse(rest.get(2))?;
                let expected: Version = parse(rest.get(3))?;
                let scores: Vec<(TeamId, i64)> = from_ron(&tail(rest, 4))?;

                let outcome = self
                    .engine
                    .submit_score(olympiad, &pin, match_id, expected, &scores)
                    .map_err(fault)?;
                to_ron(&outcome)
            }
            _ => Err("validation: unrecognized command".to_string()),
        }
    }

    fn load_data_file(&mut self) -> anyhow::Result<()> {
        let file = data_file(DATA_FILE)?;

        match &fs::read_to_string(&file) {
            Ok(string) => match ron::from_str(string.as_str()) {
                Ok(engine) => self.engine = engine,
                Err(err) => {
                    return Err(anyhow::Error::msg(format!(
                        "RON: {}: {err}",
                        file.display()
                    )));
                }
            },
            Err(err) => match err.kind() {
                ErrorKind::NotFound => {}
                _ => return Err(anyhow::Error::msg(err.to_string())),
            },
        }

        info!("loaded the data file");
        Ok(())
    }

    fn save_data_file(&self) {
        if self.skip_the_data_file {
            return;
        }

        match ron::ser::to_string_pretty(&self.engine, ron::ser::PrettyConfig::default()) {
            Ok(string) => {
                if string.trim().is_empty() {
                    return;
                }

                match data_file(DATA_FILE) {
                    Ok(file) => match File::create(file) {
                        Ok(mut file) => {
                            if let Err(error) = file.write_all(string.as_bytes()) {
                                error!("unable to write the data file: {error}");
                            }
                        }
                        Err(error) => error!("unable to create the data file: {error}"),
                    },
                    Err(error) => error!("unable to locate the data file: {error}"),
                }
            }
            Err(error) => error!("unable to serialize the engine: {error}"),
        }
    }

    /// Asks the message handler to save the data file once an hour.
    fn save(tx: Sender<(String, Option<Sender<String>>)>) {
        thread::spawn(move || {
            loop {
                thread::sleep(Duration::from_secs(HOUR_IN_SECONDS));
                handle_error(tx.send(("0 save".to_string(), None)));
            }
        });
    }
}

/// Joins the words from `skip` on as one argument, for names and RON
/// payloads that contain spaces.
fn tail(rest: &[&str], skip: usize) -> String {
    rest.get(skip..).unwrap_or_default().join(" ")
}

fn parse<T: FromStr>(word: Option<&&str>) -> Result<T, String>
where
    T::Err: fmt::Display,
{
    let Some(word) = word else {
        return Err("validation: missing argument".to_string());
    };

    word.parse()
        .map_err(|error: T::Err| format!("validation: {error}"))
}

fn from_ron<T: serde::de::DeserializeOwned>(payload: &str) -> Result<T, String> {
    ron::from_str(payload).map_err(|error| format!("validation: {error}"))
}

fn to_ron<T: serde::Serialize>(value: &T) -> Result<String, String> {
    ron::to_string(value).map_err(|error| format!("validation: {error}"))
}

fn fault(error: EngineError) -> String {
    format!("{}: {error}", error.kind())
}

fn handle_error<T, E: fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            error!("{error}");
            exit(1)
        }
    }
}
