#[macro_use]
extern crate clap;

use {
    anyhow::{bail, Result},
    log::{error, info},
    mitgcm_prep::{
        ics::make_ics,
        load::{calc_load_anomaly, write_load_anomaly},
        obcs::make_obcs,
        parameters::{Parameters, YearRange},
        transport::{balance_obcs_files, balance_obcs_years, BalanceReport},
    },
    simplelog::{Config as LogConfig, LevelFilter, TermLogger, TerminalMode},
    std::{
        collections::BTreeMap,
        fs::{create_dir_all, File},
        path::PathBuf,
    },
};

#[quit::main]
fn main() {
    let matches = clap_app!(mitgcm_prep =>
        (version: crate_version!())
        (@arg PARAMETERS: -p --parameters +takes_value +required "Path to file containing preprocessing parameters.")
        (@arg verbose: -v --verbose "Log every interpolated record and solver iteration.")
        (@subcommand ics =>
            (about: "Interpolates source climatologies onto the model grid as initial conditions.")
        )
        (@subcommand obcs =>
            (about: "Interpolates monthly source fields onto the model's open boundaries.")
        )
        (@subcommand load_anomaly =>
            (about: "Computes the ice shelf pressure load anomaly from the initial temperature and salinity.")
        )
        (@subcommand balance =>
            (about: "Corrects open boundary velocities so the net transport into the domain is balanced.")
        )
    )
    .get_matches();

    TermLogger::init(
        if matches.is_present("verbose") {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        LogConfig::default(),
        TerminalMode::Mixed,
    )
    .expect("Failed to initialize logger");

    let params = {
        // Should never panic as clap should return an error if the argument was not supplied
        let path = matches
            .value_of("PARAMETERS")
            .expect("Path to parameters file not supplied");

        let file = File::open(path).unwrap_or_else(|e| {
            error!("Failed to open {}: \"{}\"", path, e);
            quit::with_code(1);
        });

        let params = serde_yaml::from_reader::<_, Parameters>(file).unwrap_or_else(|e| {
            error!("Failed to parse parameters from {}: \"{}\"", path, e);
            quit::with_code(1);
        });

        info!(
            "Successfully loaded preprocessing parameters from \"{}\": \n{:#?}",
            path, params
        );

        params
    };

    run_subcommand(matches.subcommand_name(), params).unwrap_or_else(|e| {
        error!("Error: \"{}\"", e);
        quit::with_code(1);
    });
}

fn log_report(report: &BalanceReport) {
    let worst = |v: &[f64]| v.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    info!(
        "Largest net transport {:e} m^3/s before, {:e} m^3/s after",
        worst(&report.before),
        worst(&report.after)
    );
}

fn run_subcommand(subcmd: Option<&str>, params: Parameters) -> Result<()> {
    let subcmd = match subcmd {
        Some(s) => s,
        None => bail!("No subcommand selected"),
    };

    let input = &params.environment.input_directory;
    let output = &params.environment.output_directory;
    create_dir_all(output)?;

    info!("Starting {}", subcmd);

    let model = params.model_grid.load()?;

    match subcmd {
        "ics" => {
            let source = params.source_grid.load()?;
            let written = make_ics(&source, &model, input, output, &params.ics)?;
            info!("Wrote {} initial condition files", written.len());
        }
        "obcs" => {
            let source = params.source_grid.load()?;
            for boundary in &params.obcs.boundaries {
                let written = make_obcs(&source, &model, *boundary, input, output, &params.obcs.config)?;
                info!("Wrote {} files for the {} boundary", written.len(), boundary);
            }
        }
        "load_anomaly" => {
            let settings = &params.load_anomaly;
            let anomaly = calc_load_anomaly(&model, settings.input(output)?, &settings.config())?;
            info!("Converged after {} iterations", anomaly.iterations);
            write_load_anomaly(&anomaly, output.join(&settings.output_file), settings.prec)?;
        }
        "balance" => {
            let settings = &params.balance;
            if settings.files.is_empty() {
                bail!("No boundary files to balance");
            }
            match settings.years {
                Some(YearRange { start, end }) => {
                    let heads = settings
                        .files
                        .iter()
                        .map(|(b, head)| (*b, output.join(head).to_string_lossy().into_owned()))
                        .collect::<BTreeMap<_, String>>();
                    for report in balance_obcs_years(&model, settings.mode, &heads, start, end, settings.prec)? {
                        log_report(&report);
                    }
                }
                None => {
                    let files = settings
                        .files
                        .iter()
                        .map(|(b, path)| (*b, output.join(path)))
                        .collect::<BTreeMap<_, PathBuf>>();
                    log_report(&balance_obcs_files(&model, settings.mode, &files, settings.prec)?);
                }
            }
        }
        _ => {
            // Should be unreachable due to clap catching this error
            bail!("Unrecognized subcommand");
        }
    }

    info!("Finished {}", subcmd);

    Ok(())
}
