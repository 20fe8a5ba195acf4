//! Go Text Protocol (GTP) front end.
//!
//! GTP is a line based protocol for driving game engines from a GUI or a
//! tournament manager. Standard commands work as for Go, with moves written
//! as cells like `c4`, plus commands for searching, inspecting and saving
//! the tree.
//!
//! ## Supported Commands
//!
//! - `name`, `version`, `protocol_version`, `list_commands`, `known_command`, `quit`
//! - `boardsize <size>`, `clear_board`, `showboard`, `hash`
//! - `play <color> <cell>`, `genmove [color]`, `undo`, `all_legal`, `history`, `winner`
//! - `time [seconds] [max_runs]` - Time and simulation budget per move
//! - `threads [n]`, `ponder [0|1]`, `param [name value]`
//! - `pv [cells...]`, `move_stats [cells...]`
//! - `save_tree <file> [min_visits] [cells...]`, `load_tree <file>`
//! - `gc` - Garbage collect the tree now
//! - `patterns <file>` - Load rollout gammas, one `pattern weight` per line
//!
//! ## Example
//!
//! ```ignore
//! use hexmcts::geometry::Hexagon;
//! use hexmcts::gtp::GtpEngine;
//! let mut gtp = GtpEngine::<Hexagon>::new(8)?;
//! gtp.run()?;
//! ```

use std::fs;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, bail};

use crate::engine::Engine;
use crate::geometry::{Move, Shape};
use crate::outcome::Side;
use crate::patterns::Gammas;

/// The list of known GTP commands.
const KNOWN_COMMANDS: &[&str] = &[
    "all_legal",
    "boardsize",
    "clear_board",
    "gc",
    "genmove",
    "hash",
    "history",
    "known_command",
    "list_commands",
    "load_tree",
    "move_stats",
    "name",
    "param",
    "patterns",
    "play",
    "ponder",
    "protocol_version",
    "pv",
    "quit",
    "save_tree",
    "showboard",
    "threads",
    "time",
    "undo",
    "version",
    "winner",
];

/// Budget for one `genmove`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeControl {
    pub move_time: Duration,
    pub max_runs: u64,
}

impl Default for TimeControl {
    fn default() -> Self {
        TimeControl {
            move_time: Duration::from_secs(5),
            max_runs: u64::MAX,
        }
    }
}

/// GTP engine state.
pub struct GtpEngine<S: Shape> {
    engine: Engine<S>,
    time: TimeControl,
    /// Log level of search summaries
    verbose: u8,
}

fn parse_side(s: &str) -> Option<Side> {
    match s.to_ascii_lowercase().as_str() {
        "w" | "white" | "1" | "p1" => Some(Side::P1),
        "b" | "black" | "2" | "p2" => Some(Side::P2),
        _ => None,
    }
}

fn parse_moves(args: &[&str]) -> Result<Vec<Move>, String> {
    args.iter().map(|a| a.parse::<Move>()).collect()
}

fn join(moves: &[Move]) -> String {
    moves.iter().map(Move::to_string).collect::<Vec<_>>().join(" ")
}

impl<S: Shape> GtpEngine<S> {
    pub fn new(size: usize) -> anyhow::Result<Self> {
        Ok(Self::from_engine(Engine::new(size)?))
    }

    pub fn from_engine(engine: Engine<S>) -> Self {
        GtpEngine {
            engine,
            time: TimeControl::default(),
            verbose: 1,
        }
    }

    pub fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    /// Run the GTP command loop, reading from stdin and writing to stdout.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        for line in stdin.lock().lines() {
            let line = line.context("reading a command")?;

            // Skip empty lines and comments
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (id, command_line) = Self::parse_id(line);
            let parts: Vec<&str> = command_line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }

            let command = parts[0].to_lowercase();
            let args = &parts[1..];
            let (success, message) = self.execute(&command, args);

            let prefix = if success { '=' } else { '?' };
            let id_str = id.map(|i| i.to_string()).unwrap_or_default();
            writeln!(stdout, "{prefix}{id_str} {message}\n")?;
            stdout.flush()?;

            if command == "quit" {
                break;
            }
        }
        Ok(())
    }

    /// Parse an optional numeric command ID from the beginning of the line.
    fn parse_id(line: &str) -> (Option<u32>, &str) {
        let trimmed = line.trim();
        let end = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        if end > 0 {
            if let Ok(id) = trimmed[..end].parse::<u32>() {
                return (Some(id), trimmed[end..].trim());
            }
        }
        (None, trimmed)
    }

    /// Execute a GTP command and return (success, response).
    pub fn execute(&mut self, command: &str, args: &[&str]) -> (bool, String) {
        match command {
            "name" => (true, env!("CARGO_PKG_NAME").to_string()),

            "version" => (true, env!("CARGO_PKG_VERSION").to_string()),

            "protocol_version" => (true, "2".to_string()),

            "list_commands" => (true, KNOWN_COMMANDS.join("\n")),

            "known_command" => {
                let Some(cmd) = args.first() else {
                    return (false, "missing argument".to_string());
                };
                let known = KNOWN_COMMANDS.contains(&cmd.to_lowercase().as_str());
                (true, known.to_string())
            }

            "quit" => (true, String::new()),

            "boardsize" => {
                let Some(arg) = args.first() else {
                    return (true, self.engine.board().size().to_string());
                };
                match arg.parse::<usize>() {
                    Ok(size) => match self.engine.configure(size) {
                        Ok(()) => (true, String::new()),
                        Err(e) => (false, e.to_string()),
                    },
                    Err(_) => (false, "invalid size".to_string()),
                }
            }

            "clear_board" => {
                let size = self.engine.board().size();
                match self.engine.configure(size) {
                    Ok(()) => (true, String::new()),
                    Err(e) => (false, e.to_string()),
                }
            }

            "showboard" => (true, format!("\n{}", self.engine.board())),

            "hash" => (true, format!("{:016x}", self.engine.board().hash())),

            "play" => {
                if args.len() < 2 {
                    return (false, "missing arguments".to_string());
                }
                let Some(side) = parse_side(args[0]) else {
                    return (false, format!("invalid color '{}'", args[0]));
                };
                if side != self.engine.board().to_play() {
                    return (false, format!("it is {}'s turn", self.engine.board().to_play()));
                }
                let mv = match args[1].parse::<Move>() {
                    Ok(m) => m,
                    Err(e) => return (false, e),
                };
                match self.engine.commit_move(mv) {
                    Ok(()) => (true, String::new()),
                    Err(e) => (false, e.to_string()),
                }
            }

            "genmove" => {
                if let Some(side) = args.first().and_then(|a| parse_side(a)) {
                    if side != self.engine.board().to_play() {
                        return (false, format!("it is {}'s turn", self.engine.board().to_play()));
                    }
                }
                let result = match self.engine.search(self.time.move_time, self.time.max_runs, self.verbose) {
                    Ok(r) => r,
                    Err(e) => return (false, e.to_string()),
                };
                if !result.best.is_cell() {
                    return (true, "resign".to_string());
                }
                match self.engine.commit_move(result.best) {
                    Ok(()) => (true, result.best.to_string()),
                    Err(e) => (false, e.to_string()),
                }
            }

            "undo" => {
                if self.engine.undo_last() {
                    (true, String::new())
                } else {
                    (false, "no moves to undo".to_string())
                }
            }

            "all_legal" => {
                let moves: Vec<Move> = self.engine.board().moves().collect();
                (true, join(&moves))
            }

            "history" => (true, join(self.engine.history())),

            "winner" => (true, self.engine.board().outcome().to_string()),

            "time" => {
                let mut time = self.time;
                if let Some(t) = args.first() {
                    match t.parse::<f64>().ok().and_then(|t| Duration::try_from_secs_f64(t).ok()) {
                        Some(d) => time.move_time = d,
                        None => return (false, format!("invalid time '{t}'")),
                    }
                }
                if let Some(r) = args.get(1) {
                    match r.parse::<u64>() {
                        Ok(0) => time.max_runs = u64::MAX,
                        Ok(r) => time.max_runs = r,
                        Err(_) => return (false, format!("invalid run count '{r}'")),
                    }
                }
                self.time = time;
                (true, format!("move time {}, max runs {}", time.move_time.as_secs_f64(), time.max_runs))
            }

            "threads" => {
                if let Some(n) = args.first() {
                    match n.parse::<usize>() {
                        Ok(n) if n > 0 => self.engine.set_threads(n),
                        _ => return (false, format!("invalid thread count '{n}'")),
                    }
                }
                (true, self.engine.num_threads().to_string())
            }

            "ponder" => {
                if let Some(v) = args.first() {
                    match *v {
                        "0" | "off" => self.engine.set_ponder(false),
                        "1" | "on" => self.engine.set_ponder(true),
                        _ => return (false, format!("invalid value '{v}'")),
                    }
                }
                (true, self.engine.is_pondering().to_string())
            }

            "param" => {
                if args.len() < 2 {
                    let lines: Vec<String> = self
                        .engine
                        .config()
                        .params()
                        .into_iter()
                        .map(|(k, v)| format!("{k} {v}"))
                        .collect();
                    return (true, format!("\n{}", lines.join("\n")));
                }
                match self.engine.update_config(|c| c.set(args[0], args[1])) {
                    Ok(()) => (true, String::new()),
                    Err(e) => (false, e),
                }
            }

            "pv" => match parse_moves(args) {
                Ok(prefix) => (true, join(&self.engine.principal_variation(&prefix))),
                Err(e) => (false, e),
            },

            "move_stats" => match parse_moves(args) {
                Ok(path) => (true, format!("\n{}", self.engine.move_stats(&path))),
                Err(e) => (false, e),
            },

            "save_tree" => match self.save_tree(args) {
                Ok(n) => (true, format!("saved {n} nodes")),
                Err(e) => (false, format!("{e:#}")),
            },

            "load_tree" => match self.load_tree(args) {
                Ok(()) => (true, String::new()),
                Err(e) => (false, format!("{e:#}")),
            },

            "gc" => {
                let freed = match self.engine.force_collect() {
                    Ok(n) => n,
                    Err(e) => return (false, e.to_string()),
                };
                let released = self.engine.force_compact();
                (
                    true,
                    format!("freed {freed} nodes, released {released}, {} left", self.engine.node_count()),
                )
            }

            "patterns" => match self.load_patterns(args) {
                Ok(n) => (true, format!("loaded {n} patterns")),
                Err(e) => (false, format!("{e:#}")),
            },

            _ => (false, format!("unknown command: {command}")),
        }
    }

    fn save_tree(&self, args: &[&str]) -> anyhow::Result<usize> {
        let Some(file) = args.first() else {
            bail!("missing file name");
        };
        let threshold = match args.get(1) {
            Some(t) => t.parse().with_context(|| format!("invalid visit threshold '{t}'"))?,
            None => 0,
        };
        let path = parse_moves(args.get(2..).unwrap_or(&[])).map_err(anyhow::Error::msg)?;
        let record = self.engine.serialize_subtree(&path, threshold)?;
        fs::write(file, record.to_string()).with_context(|| format!("writing {file}"))?;
        Ok(record.root.size())
    }

    fn load_tree(&mut self, args: &[&str]) -> anyhow::Result<()> {
        let Some(file) = args.first() else {
            bail!("missing file name");
        };
        let text = fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
        let record = text.parse().with_context(|| format!("parsing {file}"))?;
        self.engine.load_subtree(&record)?;
        Ok(())
    }

    fn load_patterns(&mut self, args: &[&str]) -> anyhow::Result<usize> {
        let Some(file) = args.first() else {
            bail!("missing file name");
        };
        let text = fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
        let mut gammas = Gammas::default();
        let mut count = 0;
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(pattern), Some(weight)) = (fields.next(), fields.next()) else {
                bail!("line {}: expected a pattern and a weight", i + 1);
            };
            let pattern: u16 = pattern
                .parse()
                .with_context(|| format!("line {}: invalid pattern '{pattern}'", i + 1))?;
            let weight: f32 = weight
                .parse()
                .with_context(|| format!("line {}: invalid weight '{weight}'", i + 1))?;
            gammas.set(pattern, Side::P1, weight);
            count += 1;
        }
        self.engine.update_config(|c| c.gammas = gammas);
        Ok(count)
    }
}
