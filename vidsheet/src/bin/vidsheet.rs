use std::{
    ffi::OsString,
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Instant,
};

use clap::Parser;
use color_eyre::eyre::{self, Context};
use vidsheet::{
    config::Sampling,
    sink::{DeliverySink, FileSink},
    Pipeline, PipelineError, SheetConfig,
};
use vidsheet_common::{
    bin_common::{
        init::{init_eyre, init_logger, Verbosity},
        termination,
    },
    utils::{
        fsutils::{collect_videos, read_optional_file},
        work_queue::WorkQueue,
        workers::{scoped_workers, FinishedWorker},
    },
};

#[derive(Parser, Debug)]
#[command()]
/// Makes a contact sheet for every given video: a grid of frames from random points in
/// the video, each labeled with its time.
///
/// Directories are searched, non-recursively, for videos.
struct Cli {
    /// A RON file with a `SheetConfig`, the flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows in the grid
    #[arg(long)]
    rows: Option<u32>,

    /// Columns in the grid
    #[arg(long)]
    columns: Option<u32>,

    /// Height every frame is scaled to before being placed
    #[arg(long)]
    frame_height: Option<u32>,

    /// Pixels of black around every cell
    #[arg(long)]
    margin: Option<u32>,

    /// Side of the finished, square, sheet
    #[arg(long)]
    output_size: Option<u32>,

    /// JPEG quality, 1 to 100
    #[arg(long)]
    quality: Option<u8>,

    /// Take one frame from each equally long part of the video instead of anywhere
    #[arg(long)]
    stratified: bool,

    /// Make this many sheets at the same time
    #[arg(long, short = 'j', default_value = "1")]
    threads: NonZeroU32,

    /// A file to additionally write the logs to
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Log debug messages as well
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Where to place the sheets
    #[arg(long, short = 'o')]
    outdir: PathBuf,

    /// Videos, or directories with videos
    #[arg(required = true, num_args = 1..)]
    videos: Vec<PathBuf>,
}

impl Cli {
    fn sheet_config(&self) -> eyre::Result<SheetConfig> {
        let mut config = match &self.config {
            Some(path) => SheetConfig::from_ron_file(path)
                .wrap_err_with(|| format!("failed to load the config at {path:?}"))?,
            None => SheetConfig::default(),
        };

        let overrides = [
            (&mut config.rows, self.rows),
            (&mut config.columns, self.columns),
            (&mut config.frame_height, self.frame_height),
            (&mut config.margin, self.margin),
            (&mut config.output_size, self.output_size),
        ];
        for (field, value) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(quality) = self.quality {
            config.jpeg_quality = quality;
        }
        if self.stratified {
            config.sampling = Sampling::Stratified;
        }

        Ok(config)
    }
}

fn cli_arguments() -> eyre::Result<Cli> {
    const ARGS_FILE: &str = ".vidsheetrc";
    let args = with_args_file(std::env::args_os().collect(), Path::new(ARGS_FILE))?;
    Ok(Cli::parse_from(args))
}

/// Takes the flags from `args_file`, if it exists, when nothing but the program name was
/// given.
fn with_args_file(mut args: Vec<OsString>, args_file: &Path) -> eyre::Result<Vec<OsString>> {
    if args.len() == 1 {
        if let Some(flags) = read_optional_file(args_file).wrap_err_with(|| {
            format!("Could not read config file at: {}", args_file.display())
        })? {
            args.extend(flags.split_whitespace().map(OsString::from));
        }
    }
    Ok(args)
}

fn main() -> eyre::Result<()> {
    init_eyre()?;
    let cli = cli_arguments()?;
    init_logger(cli.logfile.as_deref(), Verbosity::from_flag(cli.verbose))?;

    log::debug!("CLI arguments: {cli:#?}");

    let config = cli.sheet_config()?;
    log::debug!("Sheet config: {config:?}");
    let pipeline = Pipeline::new(config).wrap_err("invalid sheet config")?;

    let videos: Vec<PathBuf> =
        collect_videos(&cli.videos).wrap_err("failed to list the videos")?;
    log::info!("Found {} videos", videos.len());
    let videos = WorkQueue::new(videos);

    let sink = FileSink::new(&cli.outdir)
        .wrap_err_with(|| format!("failed to create the outdir at {:?}", cli.outdir))?;

    let term_cookie =
        termination::Cookie::new().wrap_err("failed to create term cookie")?;

    let threads: usize = cli.threads.get().try_into().expect("should fit");
    let ctx = worker::Ctx {
        pipeline: &pipeline,
        sink: &sink,
        videos: &videos,
        term_cookie: &term_cookie,
    };
    let finished_workers = scoped_workers(|s| {
        for _ in 0..threads {
            s.spawn("S", move || worker::main(ctx));
        }
    });

    let all_ok = finished_workers
        .into_iter()
        .map(|FinishedWorker { result, name }| match result {
            Err(panic) => {
                log::error!("Thread '{name}' panicked with: {panic}");
                false
            }
            Ok(Err(e)) => {
                log::error!("Thread '{name}' returned an error: {e:?}");
                false
            }
            Ok(Ok(())) => true,
        })
        .fold(true, |acc, ok| acc && ok);

    if all_ok {
        Ok(())
    } else {
        Err(eyre::eyre!("At least one video failed"))
    }
}

mod worker {
    use super::*;

    #[derive(Clone, Copy)]
    pub struct Ctx<'env> {
        pub pipeline: &'env Pipeline,
        pub sink: &'env FileSink,
        pub videos: &'env WorkQueue<PathBuf>,
        pub term_cookie: &'env termination::Cookie,
    }

    pub fn main(ctx: Ctx<'_>) -> eyre::Result<()> {
        log::debug!("sheet worker working");

        let mut failed = Vec::new();
        while let Some((i, video)) = ctx.videos.next_index() {
            if ctx.term_cookie.is_terminating() {
                log::warn!("Termination signal received");
                break;
            }

            log::info!("Progress: {}/{} videos", i + 1, ctx.videos.len());
            if let Err(e) = one_video(ctx, video) {
                log::error!("Failed to make a sheet for '{}': {:?}", video.display(), e);
                failed.push((video, e));
            }
        }

        log::debug!("sheet worker ended");

        if !failed.is_empty() {
            let mut lines = vec!["Summary of videos that errored:".to_string()];
            lines.extend(
                failed
                    .into_iter()
                    .map(|(path, error)| format!("'{}': {error:#}", path.display())),
            );
            eyre::bail!(lines.join("\n"));
        }

        Ok(())
    }

    fn one_video(ctx: Ctx<'_>, video: &Path) -> eyre::Result<()> {
        let before = Instant::now();
        let sheet = match ctx.pipeline.run(video) {
            Ok(sheet) => sheet,
            Err(PipelineError::NoFramesDecoded) => {
                eyre::bail!("no frames could be decoded, there is no sheet")
            }
            Err(e) => return Err(e).wrap_err("failed to make the sheet"),
        };
        log::info!(
            "It took {} to make the sheet for {}",
            humantime::Duration::from(before.elapsed()),
            video.display()
        );

        ctx.sink
            .deliver(video, &sheet)
            .wrap_err("failed to deliver the sheet")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn flags_override_the_config_file() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = dir.path().join("sheet.ron");
        std::fs::write(&config, "(rows: 2, margin: 0)")?;

        let mut argv = args(&["vidsheet", "--config"]);
        argv.push(config.into_os_string());
        argv.extend(args(&["--rows", "3", "-o", "out", "video.mkv"]));

        let cli = Cli::parse_from(argv);
        let sheet = cli.sheet_config()?;
        assert_eq!(3, sheet.rows);
        assert_eq!(0, sheet.margin);
        assert_eq!(SheetConfig::default().columns, sheet.columns);
        assert_eq!(Sampling::Random, sheet.sampling);
        Ok(())
    }

    #[test]
    fn stratified_flag() -> eyre::Result<()> {
        let cli = Cli::parse_from(args(&[
            "vidsheet",
            "--stratified",
            "--quality",
            "80",
            "-o",
            "out",
            "video.mkv",
        ]));
        let sheet = cli.sheet_config()?;
        assert_eq!(Sampling::Stratified, sheet.sampling);
        assert_eq!(80, sheet.jpeg_quality);
        assert_eq!(SheetConfig::default().rows, sheet.rows);
        Ok(())
    }

    #[test]
    fn args_file_only_without_arguments() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let args_file = dir.path().join(".vidsheetrc");
        std::fs::write(&args_file, "--rows 5\n-o sheets  a.mkv\n")?;

        let from_file = with_args_file(args(&["vidsheet"]), &args_file)?;
        assert_eq!(
            args(&["vidsheet", "--rows", "5", "-o", "sheets", "a.mkv"]),
            from_file
        );
        let cli = Cli::parse_from(from_file);
        assert_eq!(Some(5), cli.rows);
        assert_eq!(vec![PathBuf::from("a.mkv")], cli.videos);

        let given = args(&["vidsheet", "-o", "x", "b.mkv"]);
        assert_eq!(given, with_args_file(given.clone(), &args_file)?);

        let missing = dir.path().join("nothing-here");
        assert_eq!(
            args(&["vidsheet"]),
            with_args_file(args(&["vidsheet"]), &missing)?
        );
        Ok(())
    }
}
