use std::{collections::HashMap, process};

use guardd::{
    check,
    cli::{Cli, Commands, parse_args},
    error::GuardianError,
    logs,
    spec::{DaemonSpec, WorkerCommand},
    start,
    status,
    stop::{self, StopOptions, StopOutcome},
    validate,
};

fn main() {
    let args = parse_args();
    logs::init_cli_logging(args.log_level.as_deref());

    if let Err(err) = run(args) {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn run(args: Cli) -> Result<(), GuardianError> {
    match args.command {
        Commands::Start {
            pidfile,
            stdout,
            stderr,
            guardian_log,
            name,
            term_timeout,
            working_dir,
            user,
            group,
            env,
            command,
        } => {
            let term_timeout = validate::seconds("term_timeout", &term_timeout)?;
            let env = parse_env(&env)?;

            let worker = match command.as_slice() {
                [single] => WorkerCommand::shell(single.clone()),
                _ => WorkerCommand::Exec(command),
            };

            let mut spec = DaemonSpec::new(worker, pidfile);
            if let Some(path) = stdout {
                spec.stdout = path;
            }
            if let Some(path) = stderr {
                spec.stderr = path;
            }
            spec.guardian_log = guardian_log;
            spec.name = name;
            spec.term_timeout = term_timeout;
            spec.working_dir = working_dir;
            spec.user = user;
            spec.group = group;
            spec.env = env;

            start::start(spec)?;
            println!("started");
        }
        Commands::Stop { pidfile, timeout } => {
            let options = StopOptions::from_raw(&timeout)?;
            match stop::stop(&pidfile, options)? {
                StopOutcome::Stopped => println!("stopped"),
                StopOutcome::NotRunning => println!("not running"),
            }
        }
        Commands::Check { pidfile, json } => {
            if json {
                let snapshot = status::inspect(&pidfile)?;
                println!("{}", snapshot.to_json()?);
                if !snapshot.alive {
                    process::exit(1);
                }
            } else if check::check(&pidfile)? {
                println!("running");
            } else {
                println!("not running");
                process::exit(1);
            }
        }
    }
    Ok(())
}

fn parse_env(pairs: &[String]) -> Result<HashMap<String, String>, GuardianError> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| {
                    GuardianError::InvalidSpec(format!(
                        "environment entry '{pair}' is not KEY=VALUE"
                    ))
                })
        })
        .collect()
}
