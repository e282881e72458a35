use clap::{crate_authors, crate_version, Clap};
use serde::Serialize;
use slog::*;
use std::{
    path::PathBuf,
    process::exit,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use syncpool::{FairRwLock, JobGroup, PoolConfig, Result, WorkerPool};

#[derive(Clap)]
#[clap(version =crate_version!() , author = crate_authors!())]
struct Options {
    #[clap(subcommand)]
    subcmd: SubCommand,
}
#[derive(Clap)]
enum SubCommand {
    Pool(PoolOptions),
    Group(GroupOptions),
    Lock(LockOptions),
}
#[derive(Clap)]
struct PoolOptions {
    #[clap(long, short, default_value = "0")]
    threads: usize,
    #[clap(long, short, default_value = "100")]
    jobs: usize,
    #[clap(long, short, parse(from_os_str))]
    config: Option<PathBuf>,
}
#[derive(Clap)]
struct GroupOptions {
    #[clap(long, short, default_value = "0")]
    threads: usize,
    #[clap(long, short, default_value = "50")]
    jobs: usize,
    #[clap(long, short, default_value = "20")]
    background: usize,
}
#[derive(Clap)]
struct LockOptions {
    #[clap(long, default_value = "4")]
    readers: usize,
    #[clap(long, default_value = "2")]
    writers: usize,
    #[clap(long, default_value = "1000")]
    rounds: u64,
}

#[derive(Serialize)]
struct PoolReport {
    threads: usize,
    jobs: usize,
    completed: usize,
    busy_after_wait: usize,
    elapsed_ms: u64,
}

#[derive(Serialize)]
struct GroupReport {
    threads: usize,
    jobs: usize,
    completed: usize,
    background: usize,
    background_done_at_group_wait: usize,
    elapsed_ms: u64,
}

#[derive(Serialize)]
struct LockReport {
    readers: usize,
    writers: usize,
    rounds: u64,
    value: u64,
    expected: u64,
    max_seen_by_readers: u64,
}

fn main() {
    let logger = logger();
    let options = Options::parse();
    let res = match options.subcmd {
        SubCommand::Pool(opts) => run_pool(opts, &logger),
        SubCommand::Group(opts) => run_group(opts, &logger),
        SubCommand::Lock(opts) => run_lock(opts, &logger),
    };

    if let Err(e) = res {
        error!(&logger, "{}", e);
        exit(1);
    }
}

fn logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, o!())
}

fn print_report<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn sleepy_job(counter: Arc<AtomicUsize>, millis: u64) -> impl FnOnce() + Send + 'static {
    move || {
        thread::sleep(Duration::from_millis(millis));
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

fn run_pool(opts: PoolOptions, logger: &Logger) -> Result<()> {
    let config = match opts.config {
        Some(path) => PoolConfig::from_file(&path)?,
        None => PoolConfig::new(opts.threads),
    };
    let pool = WorkerPool::with_config(&config, logger.clone())?;
    info!(logger, "pool stress starting";
        "version" => crate_version!(),
        "threads" => pool.thread_count(),
        "jobs" => opts.jobs
    );

    let start = Instant::now();
    let counter = Arc::new(AtomicUsize::new(0));
    for i in 0..opts.jobs {
        pool.submit(sleepy_job(Arc::clone(&counter), (i % 5) as u64));
    }
    pool.wait_for_completion();

    print_report(&PoolReport {
        threads: pool.thread_count(),
        jobs: opts.jobs,
        completed: counter.load(Ordering::SeqCst),
        busy_after_wait: pool.busy_thread_count(),
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

fn run_group(opts: GroupOptions, logger: &Logger) -> Result<()> {
    let pool = WorkerPool::with_config(&PoolConfig::new(opts.threads), logger.clone())?;
    info!(logger, "group stress starting";
        "threads" => pool.thread_count(),
        "jobs" => opts.jobs,
        "background" => opts.background
    );

    let start = Instant::now();
    let background = Arc::new(AtomicUsize::new(0));
    for _ in 0..opts.background {
        pool.submit(sleepy_job(Arc::clone(&background), 40));
    }

    let completed = Arc::new(AtomicUsize::new(0));
    let group = JobGroup::new(&pool);
    for _ in 0..opts.jobs {
        group.submit(sleepy_job(Arc::clone(&completed), 1));
    }
    group.wait_for_completion();
    let background_done = background.load(Ordering::SeqCst);
    let elapsed_ms = start.elapsed().as_millis() as u64;
    pool.wait_for_completion();

    print_report(&GroupReport {
        threads: pool.thread_count(),
        jobs: opts.jobs,
        completed: completed.load(Ordering::SeqCst),
        background: opts.background,
        background_done_at_group_wait: background_done,
        elapsed_ms,
    })
}

fn run_lock(opts: LockOptions, logger: &Logger) -> Result<()> {
    let pool = WorkerPool::with_config(
        &PoolConfig::new(opts.readers + opts.writers),
        logger.clone(),
    )?;
    info!(logger, "lock stress starting";
        "readers" => opts.readers,
        "writers" => opts.writers,
        "rounds" => opts.rounds
    );

    let value = Arc::new(FairRwLock::new(0u64));
    let max_seen = Arc::new(AtomicU64::new(0));
    for _ in 0..opts.writers {
        let value = Arc::clone(&value);
        let rounds = opts.rounds;
        pool.submit(move || {
            for _ in 0..rounds {
                *value.write() += 1;
            }
        });
    }
    for _ in 0..opts.readers {
        let value = Arc::clone(&value);
        let max_seen = Arc::clone(&max_seen);
        let rounds = opts.rounds;
        pool.submit(move || {
            for _ in 0..rounds {
                let seen = *value.read();
                max_seen.fetch_max(seen, Ordering::SeqCst);
            }
        });
    }
    pool.wait_for_completion();

    let report = LockReport {
        readers: opts.readers,
        writers: opts.writers,
        rounds: opts.rounds,
        value: *value.read(),
        expected: opts.writers as u64 * opts.rounds,
        max_seen_by_readers: max_seen.load(Ordering::SeqCst),
    };
    if report.value != report.expected {
        warn!(logger, "lost updates"; "value" => report.value, "expected" => report.expected);
    }
    print_report(&report)
}
