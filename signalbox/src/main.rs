extern crate signalbox;
extern crate failure;
extern crate structopt;

use signalbox::*;
use signalbox::input::dispatch::Command;
use std::path::PathBuf;
use structopt::StructOpt;

/// Signalbox -- railway signalling simulation
#[derive(StructOpt, Debug)]
#[structopt(name="signalbox")]
struct Opt {
    /// Verbose mode (-v, -vv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Simulation file, zipped or plain JSON
    #[structopt(parse(from_os_str))]
    simulation: PathBuf,

    /// Command script to run against the simulation
    #[structopt(short = "s", long = "script", parse(from_os_str))]
    script: Option<PathBuf>,

    /// Save the simulation to this file when done
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<PathBuf>,

    /// Time factor, overriding the one in the file
    #[structopt(short = "t", long = "time-factor")]
    time_factor: Option<u32>,
}

fn run_command(sim: &mut Simulation, command: &Command) -> AppResult<()> {
    match *command {
        Command::Select { signal, persistent, force } => sim.select_signal(signal, persistent, force)?,
        Command::Deactivate(signal) => sim.deactivate_route(signal)?,
        Command::Tick(n) => for _ in 0..n { sim.tick(); },
        Command::Advance(ms) => { sim.advance(ms); },
        Command::Pause => sim.pause(true),
        Command::Resume => sim.pause(false),
        Command::TimeFactor(f) => { sim.set_time_factor(f); },
    }
    Ok(())
}

fn run(opt :&Opt) -> AppResult<()> {
    let mut sim = get_simulation(&opt.simulation)?;
    sim.subscribe(Box::new(|n| println!("> {:?}", n)));
    if let Some(f) = opt.time_factor {
        sim.set_time_factor(f);
    }

    if opt.verbose >= 2 {
        println!("Track items:");
        for x in sim.infrastructure().iter() {
            println!("  * {} {:?} {:?}", x.id, x.kind, x.links);
        }
        println!("Routes:");
        for x in sim.routes() {
            println!("  - {} {} -> {} {:?}", x.id, x.begin_signal, x.end_signal, x.items);
        }
    }

    if let Some(ref script) = opt.script {
        let commands = get_commands(script)?;
        if opt.verbose >= 1 {
            println!("Commands:");
            for x in &commands { println!("  - {:?}", x); }
            println!("");
        }
        for c in &commands {
            run_command(&mut sim, c)?;
        }
    }

    println!("# Time {}", sim.current_time());
    if opt.verbose >= 1 {
        println!("# Score {}", sim.score());
        for m in sim.message_logger().warnings() {
            println!("  ! {}", m.msg_text);
        }
    }
    println!("# Active routes:");
    for r in sim.routes().filter(|r| r.is_active()) {
        println!("  - {} {:?}", r.id, r.state());
    }

    if let Some(ref output) = opt.output {
        sim.save_game(output)?;
    }

    Ok(())
}

pub fn main() {
    let opt = Opt::from_args();
    let level = match opt.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    match run(&opt) {
        Ok(()) => {},
        Err(e) => {
            println!("Error:\n{}", e.as_fail());
            std::process::exit(1);
        },
    }
}
