use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use rankmap::format::score_string;
use rankmap::{
    Ascending, Descending, FloatScore, RankConfig, RankMap, Scored, ScoreOrder, StampSource,
};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
};
use tracing_subscriber::EnvFilter;

type Entry = Scored<String, FloatScore>;

/// Replay a leaderboard script against a rank map and print query results.
///
/// One command per line: `upsert <key> <score>`, `remove <key>`, `rank <key>`,
/// `bucket <score>`, `ceiling <score>`, `floor <score>`, `first`, `last`,
/// `len`, `snapshot`, `clear`. Blank lines and `#` comments are skipped.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Script to replay. Reads stdin when omitted.
    script: Option<PathBuf>,
    /// Which end of the score range ranks first.
    #[arg(long, value_enum, default_value = "desc")]
    order: Direction,
    /// Recency marker source; overrides RANKMAP_STAMP.
    #[arg(long)]
    stamp: Option<StampSource>,
    /// Cross-check both indexes after every command.
    #[arg(long)]
    validate: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq)]
enum Op {
    Upsert(String, f64),
    Remove(String),
    Rank(String),
    Bucket(f64),
    Ceiling(f64),
    Floor(f64),
    First,
    Last,
    Len,
    Snapshot,
    Clear,
}

fn parse_score(raw: Option<&str>) -> Result<f64> {
    let raw = raw.context("missing score")?;
    raw.parse::<f64>()
        .with_context(|| format!("invalid score `{raw}`"))
}

fn parse_key(raw: Option<&str>) -> Result<String> {
    raw.map(str::to_owned).context("missing key")
}

impl Op {
    fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            bail!("empty command");
        };
        let op = match cmd.to_ascii_lowercase().as_str() {
            "upsert" => Op::Upsert(parse_key(words.next())?, parse_score(words.next())?),
            "remove" => Op::Remove(parse_key(words.next())?),
            "rank" => Op::Rank(parse_key(words.next())?),
            "bucket" => Op::Bucket(parse_score(words.next())?),
            "ceiling" => Op::Ceiling(parse_score(words.next())?),
            "floor" => Op::Floor(parse_score(words.next())?),
            "first" => Op::First,
            "last" => Op::Last,
            "len" => Op::Len,
            "snapshot" => Op::Snapshot,
            "clear" => Op::Clear,
            other => bail!("unknown command `{other}`"),
        };
        if let Some(extra) = words.next() {
            bail!("unexpected argument `{extra}`");
        }
        Ok(op)
    }
}

fn fmt_opt(score: Option<&FloatScore>) -> String {
    score.map_or_else(|| "(none)".to_owned(), |s| score_string(s.0))
}

fn apply<O, W>(board: &mut RankMap<Entry, O>, op: Op, out: &mut W) -> Result<()>
where
    O: ScoreOrder<FloatScore>,
    W: Write,
{
    match op {
        Op::Upsert(key, score) => {
            board.upsert(Scored::new(key, FloatScore::from(score)));
        }
        Op::Remove(key) => {
            if board.remove(key.as_str()).is_none() {
                writeln!(out, "{key}: not present")?;
            }
        }
        Op::Rank(key) => match board.rank_of(key.as_str()) {
            Some(rank) => writeln!(out, "{key}: rank {rank}")?,
            None => writeln!(out, "{key}: not present")?,
        },
        Op::Bucket(score) => {
            let members: Vec<&str> = board
                .bucket(&FloatScore::from(score))
                .map(|e| e.key.as_str())
                .collect();
            writeln!(out, "{}: [{}]", score_string(score), members.join(", "))?;
        }
        Op::Ceiling(score) => {
            let found = board.ceiling_score(&FloatScore::from(score));
            writeln!(out, "ceiling {}: {}", score_string(score), fmt_opt(found))?;
        }
        Op::Floor(score) => {
            let found = board.floor_score(&FloatScore::from(score));
            writeln!(out, "floor {}: {}", score_string(score), fmt_opt(found))?;
        }
        Op::First => writeln!(out, "first: {}", fmt_opt(board.first_score()))?,
        Op::Last => writeln!(out, "last: {}", fmt_opt(board.last_score()))?,
        Op::Len => writeln!(out, "len: {}", board.len())?,
        Op::Snapshot => {
            for row in board.snapshot_ranked() {
                writeln!(
                    out,
                    "{:>4}  {:<16} {}",
                    row.rank,
                    row.entry.key,
                    score_string(row.entry.score.0)
                )?;
            }
        }
        Op::Clear => board.clear(),
    }
    Ok(())
}

fn replay<O, R, W>(config: RankConfig, input: R, out: &mut W, validate: bool) -> Result<()>
where
    O: ScoreOrder<FloatScore>,
    R: BufRead,
    W: Write,
{
    let mut board: RankMap<Entry, O> = RankMap::with_config(config);
    for (idx, line) in input.lines().enumerate() {
        let line = line.context("failed to read script")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let lineno = idx + 1;
        let op = Op::parse(line).with_context(|| format!("line {lineno}: `{line}`"))?;
        apply(&mut board, op, out)?;
        if validate {
            board
                .validate()
                .with_context(|| format!("index check failed after line {lineno}"))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = RankConfig::from_env().context("bad rankmap environment")?;
    if let Some(stamp) = cli.stamp {
        config = config.stamp_source(stamp);
    }

    let input: Box<dyn BufRead> = match &cli.script {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.order {
        Direction::Asc => replay::<Ascending, _, _>(config, input, &mut out, cli.validate),
        Direction::Desc => replay::<Descending, _, _>(config, input, &mut out, cli.validate),
    }
}
