// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate env_logger;
extern crate failure;
extern crate fractalkit;
extern crate log;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use failure::{format_err, Error};
use fractalkit::{
    escape, lyapunov, nebula, ColorMap, EscapeTimeRequest, Grid, LyapunovRequest,
    NebulaRequest, Raster, Region, RenderConfig, UpdateRule,
};
use log::info;
use std::path::Path;
use std::str::FromStr;

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_triple<T: FromStr>(s: &str, separator: char) -> Option<(T, T, T)> {
    let parts: Vec<&str> = s.split(separator).collect();
    if parts.len() != 3 {
        return None;
    }
    match (
        T::from_str(parts[0]),
        T::from_str(parts[1]),
        T::from_str(parts[2]),
    ) {
        (Ok(a), Ok(b), Ok(c)) => Some((a, b, c)),
        _ => None,
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const DENSITY: &str = "density";
const XBOUND: &str = "xbound";
const YBOUND: &str = "ybound";
const THREADS: &str = "threads";
const MEMORY: &str = "memory-limit";
const ITERATIONS: &str = "iterations";
const POWER: &str = "power";
const CONJUGATE: &str = "conjugate";
const HORIZON: &str = "horizon";
const SMOOTH: &str = "smooth";
const STACK: &str = "stack";
const GAMMA: &str = "gamma";
const FORCING: &str = "forcing";
const BURN_IN: &str = "burn-in";
const GAMMAS: &str = "gammas";
const SEEDS: &str = "seeds";
const TIERS: &str = "tiers";
const SEED: &str = "seed";
const SAMPLE_XBOUND: &str = "sample-xbound";
const SAMPLE_YBOUND: &str = "sample-ybound";

const MAX_THREADS: usize = 1024;

/// The arguments every generator takes.  Bounds default per generator.
fn common_args<'a, 'b>(app: App<'a, 'b>, xbound: &'a str, ybound: &'a str) -> App<'a, 'b> {
    app.arg(
        Arg::with_name(OUTPUT)
            .required(true)
            .long(OUTPUT)
            .short("o")
            .takes_value(true)
            .help("Output file; the format follows the extension"),
    )
    .arg(
        Arg::with_name(SIZE)
            .long(SIZE)
            .short("s")
            .takes_value(true)
            .default_value("4x3")
            .validator(|s| validate_pair::<u32>(&s, 'x', "Could not parse figure size"))
            .help("Figure size in units, WIDTHxHEIGHT"),
    )
    .arg(
        Arg::with_name(DENSITY)
            .long(DENSITY)
            .short("d")
            .takes_value(true)
            .default_value("300")
            .validator(|s| {
                validate_range(
                    &s,
                    std::f64::MIN_POSITIVE,
                    100_000.0,
                    "Could not parse density",
                    "Density must be positive",
                )
            })
            .help("Pixels per figure unit"),
    )
    .arg(
        Arg::with_name(XBOUND)
            .long(XBOUND)
            .short("x")
            .takes_value(true)
            .allow_hyphen_values(true)
            .default_value(xbound)
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse x bounds"))
            .help("MIN,MAX along the x axis"),
    )
    .arg(
        Arg::with_name(YBOUND)
            .long(YBOUND)
            .short("y")
            .takes_value(true)
            .allow_hyphen_values(true)
            .default_value(ybound)
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse y bounds"))
            .help("MIN,MAX along the y axis"),
    )
    .arg(
        Arg::with_name(THREADS)
            .long(THREADS)
            .short("t")
            .takes_value(true)
            .validator(|s| {
                validate_range(
                    &s,
                    1,
                    MAX_THREADS,
                    "Could not parse thread count",
                    "Thread count must be between 1 and 1024",
                )
            })
            .help("Number of threads to use in solver [default: all cores]"),
    )
    .arg(
        Arg::with_name(MEMORY)
            .long(MEMORY)
            .takes_value(true)
            .default_value("1024")
            .validator(|s| {
                validate_range(
                    &s,
                    1u64,
                    1 << 24,
                    "Could not parse memory limit",
                    "Memory limit must be between 1 and 16777216 MiB",
                )
            })
            .help("Working memory ceiling in MiB"),
    )
}

fn args<'a>() -> ArgMatches<'a> {
    let mandelbrot = common_args(
        SubCommand::with_name("mandelbrot").about("Escape-time fractal"),
        "-2.0,1.0",
        "-1.5,1.5",
    )
    .arg(
        Arg::with_name(ITERATIONS)
            .long(ITERATIONS)
            .short("i")
            .takes_value(true)
            .default_value("5000")
            .validator(|s| {
                validate_range(
                    &s,
                    1u32,
                    10_000_000,
                    "Could not parse iteration count",
                    "Iteration count must be between 1 and 10000000",
                )
            })
            .help("Maximum iterations per point"),
    )
    .arg(
        Arg::with_name(POWER)
            .long(POWER)
            .short("p")
            .takes_value(true)
            .default_value("2")
            .validator(|s| {
                validate_range(
                    &s,
                    2u32,
                    64,
                    "Could not parse power",
                    "Power must be between 2 and 64",
                )
            })
            .help("Exponent n of z^n + c"),
    )
    .arg(
        Arg::with_name(CONJUGATE)
            .long(CONJUGATE)
            .help("Iterate conj(z)^n + c instead"),
    )
    .arg(
        Arg::with_name(HORIZON)
            .long(HORIZON)
            .takes_value(true)
            .default_value("2.0")
            .validator(|s| {
                validate_range(
                    &s,
                    std::f64::MIN_POSITIVE,
                    std::f64::MAX,
                    "Could not parse horizon",
                    "Horizon must be positive",
                )
            })
            .help("Escape radius"),
    )
    .arg(
        Arg::with_name(SMOOTH)
            .long(SMOOTH)
            .help("Color by fractional escape count"),
    )
    .arg(
        Arg::with_name(STACK)
            .long(STACK)
            .takes_value(true)
            .default_value("50")
            .validator(|s| {
                validate_range(
                    &s,
                    1usize,
                    10_000,
                    "Could not parse stack count",
                    "Stack count must be between 1 and 10000",
                )
            })
            .help("Times the gray palette repeats"),
    )
    .arg(gamma_arg("0.8"));

    let lyapunov = common_args(
        SubCommand::with_name("lyapunov").about("Markus-Lyapunov fractal"),
        "2.5,3.4",
        "3.4,4.0",
    )
    .arg(
        Arg::with_name(FORCING)
            .long(FORCING)
            .short("f")
            .takes_value(true)
            .default_value("AAAAAABBBBBB")
            .help("Forcing string over A and B"),
    )
    .arg(
        Arg::with_name(BURN_IN)
            .long(BURN_IN)
            .takes_value(true)
            .default_value("2000")
            .validator(|s| {
                validate_range(
                    &s,
                    1u32,
                    10_000_000,
                    "Could not parse burn-in",
                    "Burn-in must be between 1 and 10000000",
                )
            })
            .help("Steps discarded before measuring"),
    )
    .arg(
        Arg::with_name(ITERATIONS)
            .long(ITERATIONS)
            .short("i")
            .takes_value(true)
            .default_value("2000")
            .validator(|s| {
                validate_range(
                    &s,
                    1u32,
                    10_000_000,
                    "Could not parse iteration count",
                    "Iteration count must be between 1 and 10000000",
                )
            })
            .help("Steps measured"),
    )
    .arg(
        Arg::with_name(GAMMAS)
            .long(GAMMAS)
            .takes_value(true)
            .default_value("8,1")
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse gammas"))
            .help("NEGATIVE,POSITIVE gammas"),
    );

    let nebula = common_args(
        SubCommand::with_name("nebula").about("Buddhabrot with nebula coloring"),
        "-1.75,0.85",
        "-1.10,1.10",
    )
    .arg(
        Arg::with_name(SEEDS)
            .long(SEEDS)
            .short("n")
            .takes_value(true)
            .default_value("10000000")
            .validator(|s| {
                validate_range(
                    &s,
                    1u64,
                    u64::max_value(),
                    "Could not parse seed count",
                    "Seed count must be positive",
                )
            })
            .help("Random seeds to trace"),
    )
    .arg(
        Arg::with_name(HORIZON)
            .long(HORIZON)
            .takes_value(true)
            .default_value("1.0e6")
            .validator(|s| {
                validate_range(
                    &s,
                    std::f64::MIN_POSITIVE,
                    std::f64::MAX,
                    "Could not parse horizon",
                    "Horizon must be positive",
                )
            })
            .help("Escape radius"),
    )
    .arg(
        Arg::with_name(TIERS)
            .long(TIERS)
            .takes_value(true)
            .default_value("100,1000,10000")
            .validator(|s| match parse_triple::<u32>(&s, ',') {
                Some((a, b, c)) if a > 0 && b > 0 && c > 0 => Ok(()),
                _ => Err("Tiers must be three positive counts, RED,GREEN,BLUE".to_string()),
            })
            .help("Iteration caps for the red, green and blue channels"),
    )
    .arg(
        Arg::with_name(SEED)
            .long(SEED)
            .takes_value(true)
            .validator(|s| {
                validate_range(
                    &s,
                    0u64,
                    u64::max_value(),
                    "Could not parse random seed",
                    "Random seed out of range",
                )
            })
            .help("Random seed, for reproducible renders"),
    )
    .arg(
        Arg::with_name(SAMPLE_XBOUND)
            .long(SAMPLE_XBOUND)
            .takes_value(true)
            .allow_hyphen_values(true)
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse sample x bounds"))
            .help("MIN,MAX x bounds seeds are drawn from [default: --xbound]"),
    )
    .arg(
        Arg::with_name(SAMPLE_YBOUND)
            .long(SAMPLE_YBOUND)
            .takes_value(true)
            .allow_hyphen_values(true)
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse sample y bounds"))
            .help("MIN,MAX y bounds seeds are drawn from [default: --ybound]"),
    )
    .arg(gamma_arg("0.4"));

    App::new("fractalkit")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Escape-time, Markus-Lyapunov and Nebulabrot renderer")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(mandelbrot)
        .subcommand(lyapunov)
        .subcommand(nebula)
        .get_matches()
}

fn gamma_arg<'a, 'b>(default: &'a str) -> Arg<'a, 'b> {
    Arg::with_name(GAMMA)
        .long(GAMMA)
        .short("g")
        .takes_value(true)
        .default_value(default)
        .validator(|s| {
            validate_range(
                &s,
                std::f64::MIN_POSITIVE,
                std::f64::MAX,
                "Could not parse gamma",
                "Gamma must be positive",
            )
        })
        .help("Gamma applied after normalization")
}

/// Reads a value clap has already validated.
fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T, Error> {
    let raw = matches
        .value_of(name)
        .ok_or_else(|| format_err!("missing --{}", name))?;
    T::from_str(raw).map_err(|_| format_err!("could not parse --{} {}", name, raw))
}

fn pair<T: FromStr>(matches: &ArgMatches, name: &str, separator: char) -> Result<(T, T), Error> {
    let raw = matches
        .value_of(name)
        .ok_or_else(|| format_err!("missing --{}", name))?;
    parse_pair(raw, separator).ok_or_else(|| format_err!("could not parse --{} {}", name, raw))
}

fn region(matches: &ArgMatches, xbound: &str, ybound: &str) -> Result<Region, Error> {
    Ok(Region::new(
        pair(matches, xbound, ',')?,
        pair(matches, ybound, ',')?,
    )?)
}

fn grid(matches: &ArgMatches) -> Result<Grid, Error> {
    let (width, height) = pair::<u32>(matches, SIZE, 'x')?;
    Ok(Grid::new(width, height, value(matches, DENSITY)?)?)
}

fn config(matches: &ArgMatches) -> Result<RenderConfig, Error> {
    let mut config = RenderConfig::default();
    if matches.is_present(THREADS) {
        config.threads = value(matches, THREADS)?;
    }
    config.memory_ceiling = value::<u64>(matches, MEMORY)? << 20;
    Ok(config)
}

fn mandelbrot(matches: &ArgMatches) -> Result<Raster, Error> {
    let mut request = EscapeTimeRequest::new(region(matches, XBOUND, YBOUND)?, grid(matches)?);
    let power = value(matches, POWER)?;
    request.rule = if matches.is_present(CONJUGATE) {
        UpdateRule::ConjugatePower(power)
    } else {
        UpdateRule::Power(power)
    };
    request.max_iterations = value(matches, ITERATIONS)?;
    request.horizon = value(matches, HORIZON)?;
    request.smooth = matches.is_present(SMOOTH);
    request.gamma = value(matches, GAMMA)?;
    request.colormap = ColorMap::gray().stacked(value(matches, STACK)?)?;
    Ok(escape::render(&request, &config(matches)?)?)
}

fn markus_lyapunov(matches: &ArgMatches) -> Result<Raster, Error> {
    let forcing = lyapunov::parse_forcing(matches.value_of(FORCING).unwrap_or(""))?;
    let mut request = LyapunovRequest::new(forcing, region(matches, XBOUND, YBOUND)?, grid(matches)?);
    request.burn_in = value(matches, BURN_IN)?;
    request.iterations = value(matches, ITERATIONS)?;
    request.gammas = pair(matches, GAMMAS, ',')?;
    Ok(lyapunov::render(&request, &config(matches)?)?)
}

fn nebulabrot(matches: &ArgMatches) -> Result<Raster, Error> {
    let display = region(matches, XBOUND, YBOUND)?;
    let mut request = NebulaRequest::new(display, grid(matches)?, value(matches, SEEDS)?);
    if matches.is_present(SAMPLE_XBOUND) || matches.is_present(SAMPLE_YBOUND) {
        let x = if matches.is_present(SAMPLE_XBOUND) {
            pair(matches, SAMPLE_XBOUND, ',')?
        } else {
            display.x_bound()
        };
        let y = if matches.is_present(SAMPLE_YBOUND) {
            pair(matches, SAMPLE_YBOUND, ',')?
        } else {
            display.y_bound()
        };
        request.sample_region = Some(Region::new(x, y)?);
    }
    request.horizon = value(matches, HORIZON)?;
    let (red, green, blue) = parse_triple(matches.value_of(TIERS).unwrap_or(""), ',')
        .ok_or_else(|| format_err!("could not parse --{}", TIERS))?;
    request.tiers = [red, green, blue];
    if matches.is_present(SEED) {
        request.seed = Some(value(matches, SEED)?);
    }
    request.gamma = value(matches, GAMMA)?;
    Ok(nebula::render(&request, &config(matches)?)?)
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let (raster, sub) = match matches.subcommand() {
        ("mandelbrot", Some(sub)) => (mandelbrot(sub)?, sub),
        ("lyapunov", Some(sub)) => (markus_lyapunov(sub)?, sub),
        ("nebula", Some(sub)) => (nebulabrot(sub)?, sub),
        (other, _) => return Err(format_err!("unknown generator `{}`", other)),
    };
    let output = sub
        .value_of(OUTPUT)
        .ok_or_else(|| format_err!("missing --{}", OUTPUT))?;
    let (width, height) = (raster.width(), raster.height());
    raster.into_image().save(Path::new(output))?;
    info!("wrote {}x{} image to {}", width, height, output);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
