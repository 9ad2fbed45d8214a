use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::exit;
use std::str::FromStr;

use anyhow::Context;
use rayon::prelude::*;
use structopt::StructOpt;

use fingermatch::{FeaturePipeline, Features, Matcher};
use tools::{file_pipeline, init_logging, load_config, MAX_MINUTIAE};

/// Extensions picked up when a directory of templates is given.
const TEMPLATE_EXTENSIONS: [&str; 4] = ["xyt", "ist", "iso", "fmr"];

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
enum MatchMode {
    Any,
    OnlyFirstMatch,
    AllMatches,
}

impl FromStr for MatchMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "any" => Ok(MatchMode::Any),
            "first-match" => Ok(MatchMode::OnlyFirstMatch),
            "all-matches" => Ok(MatchMode::AllMatches),
            _ => Err("invalid mode"),
        }
    }
}

/// One-based inclusive range of list entries, stored zero-based.
#[derive(Debug, Copy, Clone)]
struct Range {
    first: usize,
    last: usize,
}

impl FromStr for Range {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (first, last) = s.split_once('-').ok_or("no separator")?;
        let first: usize = first.parse().map_err(|_| "invalid start of range")?;
        let last: usize = last.parse().map_err(|_| "invalid end of range")?;

        if first >= 1 && first <= last {
            Ok(Range {
                first: first - 1,
                last: last - 1,
            })
        } else {
            Err("invalid order")
        }
    }
}

/// Triplet-based fingerprint matcher
#[derive(StructOpt, Debug)]
struct Options {
    /// Matching mode; supported modes: all, first-match, all-matches
    #[structopt(short = "m", long, default_value = "all")]
    mode: MatchMode,

    /// Matcher preset: nn, no-rotation, delaunay
    #[structopt(long, default_value = "nn")]
    matcher: String,

    /// JSON file with the matcher configuration; overrides --matcher
    #[structopt(short = "c", long)]
    config: Option<PathBuf>,

    /// Set match score threshold
    #[structopt(short = "t", long, default_value = "40")]
    threshold: f64,

    /// Only print the filenames between which match scores would be computed
    #[structopt(short = "d", long)]
    dry_run: bool,

    /// Set maximum number of minutiae to use from any file; allowed range 0-200
    #[structopt(short = "n", long, default_value = "150")]
    max_minutiae: usize,

    /// Number of threads to use
    #[structopt(short = "T", long, default_value = "1")]
    threads: usize,

    /// File containing list of pairs to compare, one file in each line
    #[structopt(short = "M", long)]
    pair_file: Option<PathBuf>,

    /// File containing list of probe files or directory
    #[structopt(short = "P", long)]
    probe_files: Option<PathBuf>,

    /// File containing list of gallery files or directory
    #[structopt(short = "G", long)]
    gallery_files: Option<PathBuf>,

    /// Single probe file
    #[structopt(short = "p", long)]
    fixed_probe: Option<PathBuf>,

    /// Single gallery file
    #[structopt(short = "g", long)]
    fixed_gallery: Option<PathBuf>,

    /// Subset of files in the probe list to process
    #[structopt(long)]
    probe_range: Option<Range>,

    /// Subset of files in the gallery file to process
    #[structopt(long)]
    gallery_range: Option<Range>,

    /// Print only scores without filenames (applicable only for -m 'all')
    #[structopt(short = "s", long)]
    only_scores: bool,

    /// Do not preserve order; can run slightly faster (not with -m 'first-match')
    #[structopt(short = "r", long)]
    relaxed_output_order: bool,

    /// Output file
    #[structopt(short = "o", long)]
    output_file: Option<PathBuf>,

    inputs: Vec<PathBuf>,
}

fn find_items_from_pairs(file_name: impl AsRef<Path>) -> anyhow::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let file = std::fs::File::open(file_name).context("cannot load pairs from file")?;
    let buff = std::io::BufReader::new(file);

    let mut probes = vec![];
    let mut galleries = vec![];

    for (i, line) in buff.lines().enumerate() {
        let line = line.context("error while reading line")?;
        if i % 2 == 0 {
            probes.push(line.into());
        } else {
            galleries.push(line.into());
        }
    }

    if probes.len() != galleries.len() {
        log::warn!(
            "there are {} probe files and {} gallery files, skipping the last probe",
            probes.len(),
            galleries.len()
        );
        probes.pop();
    }

    Ok((probes, galleries))
}

fn get_items_from_file(file_name: impl AsRef<Path>) -> anyhow::Result<Vec<PathBuf>> {
    let file = std::fs::File::open(file_name).context("cannot load list from file")?;
    let buff = std::io::BufReader::new(file);

    let mut files = vec![];
    for line in buff.lines() {
        let line = line.context("cannot read line")?;
        if !line.trim().is_empty() {
            files.push(line.into());
        }
    }

    Ok(files)
}

fn get_items_from_directory(directory: impl AsRef<Path>) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = vec![];

    for entry in std::fs::read_dir(directory).context("cannot read directory")? {
        let entry = entry.context("cannot read entry")?;
        let meta = entry.metadata().context("cannot read file metadata")?;
        if !meta.is_file() {
            continue;
        }

        let path = entry.path();
        match path.extension().and_then(OsStr::to_str) {
            Some(extension) if TEMPLATE_EXTENSIONS.contains(&extension) => files.push(path),
            _ => continue,
        }
    }
    files.sort();
    Ok(files)
}

fn get_items_from_file_or_directory(path: impl AsRef<Path>) -> anyhow::Result<Vec<PathBuf>> {
    let path = path.as_ref();
    if path.is_file() {
        get_items_from_file(path)
    } else if path.is_dir() {
        get_items_from_directory(path)
    } else if path.exists() {
        Err(anyhow::anyhow!("cannot read path {}", path.display()))
    } else {
        Err(anyhow::anyhow!("path {} does not exist", path.display()))
    }
}

fn get_slice_by_range<T>(slice: &[T], range: Range) -> Option<&[T]> {
    slice.get(range.first..=range.last)
}

#[derive(Debug, Copy, Clone)]
enum CompareMode {
    OneToOne,
    EveryProbeWithEachGallery,
    OneToMany,
}

fn check_options(opt: &Options) -> Vec<&'static str> {
    let mut errors = vec![];
    if opt.max_minutiae > MAX_MINUTIAE {
        errors.push("invalid number of computable minutiae");
    }
    if opt.threads == 0 {
        errors.push("at least one thread is needed");
    }

    let exclusive = [
        (opt.pair_file.is_some() && opt.probe_files.is_some(), r#"flags "-M" and "-P" are incompatible"#),
        (opt.pair_file.is_some() && opt.gallery_files.is_some(), r#"flags "-M" and "-G" are incompatible"#),
        (opt.pair_file.is_some() && opt.fixed_probe.is_some(), r#"flags "-M" and "-p" are incompatible"#),
        (opt.pair_file.is_some() && opt.fixed_gallery.is_some(), r#"flags "-M" and "-g" are incompatible"#),
        (opt.probe_files.is_some() && opt.fixed_probe.is_some(), r#"flags "-P" and "-p" are incompatible"#),
        (opt.gallery_files.is_some() && opt.fixed_gallery.is_some(), r#"flags "-G" and "-g" are incompatible"#),
        (
            opt.mode != MatchMode::Any && opt.pair_file.is_some(),
            r#"flag "-M" is not compatible with modes other than "all""#,
        ),
        (
            opt.mode == MatchMode::OnlyFirstMatch && opt.relaxed_output_order,
            r#"flag "-r" is not compatible with mode "first-match""#,
        ),
    ];
    errors.extend(exclusive.iter().filter(|(failed, _)| *failed).map(|(_, message)| *message));
    errors
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let mut opt: Options = Options::from_args();
    log::debug!("{:?}", opt);

    let errors = check_options(&opt);
    if !errors.is_empty() {
        eprintln!("Parsing errors:");
        for error in errors {
            eprintln!(" - {}", error);
        }
        exit(-1);
    }

    let mode = match opt.mode {
        MatchMode::Any => CompareMode::EveryProbeWithEachGallery,
        _ => CompareMode::OneToMany,
    };
    let inputs = std::mem::take(&mut opt.inputs);

    let (probes, galleries, mode) = if let Some(pair_file) = &opt.pair_file {
        let (probes, galleries) = find_items_from_pairs(pair_file)?;
        (probes, galleries, CompareMode::OneToMany)
    } else if let (Some(probe), Some(gallery)) = (&opt.fixed_probe, &opt.fixed_gallery) {
        (vec![probe.clone()], vec![gallery.clone()], mode)
    } else if let Some(fixed_probe) = &opt.fixed_probe {
        let galleries = if let Some(gallery_files) = &opt.gallery_files {
            get_items_from_file_or_directory(gallery_files)?
        } else if !inputs.is_empty() {
            inputs
        } else {
            eprintln!("missing gallery files");
            exit(-1);
        };
        (vec![fixed_probe.clone()], galleries, mode)
    } else if let Some(fixed_gallery) = &opt.fixed_gallery {
        let probes = if let Some(probe_files) = &opt.probe_files {
            get_items_from_file_or_directory(probe_files)?
        } else if !inputs.is_empty() {
            inputs
        } else {
            eprintln!("missing probe files");
            exit(-1);
        };
        (probes, vec![fixed_gallery.clone()], mode)
    } else if let (Some(probe_files), Some(gallery_files)) = (&opt.probe_files, &opt.gallery_files) {
        let probes = get_items_from_file_or_directory(probe_files)?;
        let galleries = get_items_from_file_or_directory(gallery_files)?;
        (probes, galleries, mode)
    } else if let (Some(probe_files), false) = (&opt.probe_files, inputs.is_empty()) {
        (get_items_from_file_or_directory(probe_files)?, inputs, mode)
    } else if let (Some(gallery_files), false) = (&opt.gallery_files, inputs.is_empty()) {
        (inputs, get_items_from_file_or_directory(gallery_files)?, mode)
    } else if !inputs.is_empty() {
        if inputs.len() % 2 == 1 {
            eprintln!("Number of files to compare is odd");
            exit(-1);
        }

        let mut probes = Vec::with_capacity(inputs.len() / 2);
        let mut galleries = Vec::with_capacity(inputs.len() / 2);
        for (i, path) in inputs.into_iter().enumerate() {
            if i % 2 == 0 {
                probes.push(path);
            } else {
                galleries.push(path);
            }
        }
        (probes, galleries, CompareMode::OneToOne)
    } else {
        eprintln!("missing input data");
        exit(-1);
    };

    let probe_range = match opt.probe_range {
        Some(r) => get_slice_by_range(&probes, r).context("probe range out of bounds")?,
        None => &probes,
    };

    let gallery_range = match opt.gallery_range {
        Some(r) => get_slice_by_range(&galleries, r).context("gallery range out of bounds")?,
        None => &galleries,
    };

    if opt.dry_run {
        dry_run(probe_range, gallery_range, mode);
        return Ok(());
    }

    let config = load_config(&opt.matcher, opt.config.as_deref())?;
    let matcher = Matcher::new(config).context("cannot create matcher")?;

    let started = std::time::Instant::now();
    run(probe_range, gallery_range, mode, &matcher, &opt)?;
    log::info!("finished in {:?}", started.elapsed());

    Ok(())
}

fn comparisons<'data>(
    probes: &'data [PathBuf],
    galleries: &'data [PathBuf],
    mode: CompareMode,
) -> Vec<(&'data PathBuf, &'data PathBuf)> {
    match mode {
        CompareMode::OneToOne => probes.iter().zip(galleries.iter()).collect(),
        CompareMode::EveryProbeWithEachGallery | CompareMode::OneToMany => probes
            .iter()
            .flat_map(|probe| galleries.iter().map(move |gallery| (probe, gallery)))
            .collect(),
    }
}

fn dry_run(probes: &[PathBuf], galleries: &[PathBuf], mode: CompareMode) {
    for (probe, gallery) in comparisons(probes, galleries, mode) {
        println!("{} {}", probe.display(), gallery.display());
    }
}

struct MatchResult<'data> {
    probe: &'data PathBuf,
    gallery: &'data PathBuf,
    score: Option<f64>,
}

struct ExecuteOptions<'data, 'm> {
    compare_mode: CompareMode,
    match_mode: MatchMode,
    threshold: f64,
    probes: &'data [PathBuf],
    galleries: &'data [PathBuf],
    matcher: &'m Matcher,
    pipeline: FeaturePipeline<Path>,
    match_done: crossbeam::channel::Sender<MatchResult<'data>>,
    threads: usize,
    relaxed_order: bool,
}

impl ExecuteOptions<'_, '_> {
    fn accepts(&self, score: Option<f64>) -> bool {
        match self.match_mode {
            MatchMode::Any => true,
            _ => score.map_or(false, |score| score >= self.threshold),
        }
    }
}

fn run(
    probes: &[PathBuf],
    galleries: &[PathBuf],
    compare_mode: CompareMode,
    matcher: &Matcher,
    options: &Options,
) -> anyhow::Result<()> {
    let (tx_match_done, rx_match_done) = crossbeam::channel::unbounded::<MatchResult>();

    let execute_options = ExecuteOptions {
        compare_mode,
        match_mode: options.mode,
        threshold: options.threshold,
        probes,
        galleries,
        matcher,
        pipeline: file_pipeline(matcher.config(), options.max_minutiae),
        match_done: tx_match_done,
        threads: options.threads,
        relaxed_order: options.relaxed_output_order,
    };

    let written = crossbeam::scope(move |scope| {
        scope.spawn(move |_| {
            if execute_options.threads > 1 {
                execute_parallel(&execute_options)
            } else {
                execute_sequential(&execute_options)
            }
            // the sender is dropped with the options, which ends the writer loop
        });

        let writer = scope.spawn(move |_| -> anyhow::Result<()> {
            let only_scores = options.mode == MatchMode::Any && options.only_scores;
            match options.output_file.as_ref() {
                Some(file) => {
                    let file = std::fs::File::create(file)
                        .with_context(|| format!("cannot create {}", file.display()))?;
                    print_into_stream(&mut std::io::BufWriter::new(file), rx_match_done, only_scores)
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut buff = std::io::BufWriter::new(stdout.lock());
                    print_into_stream(&mut buff, rx_match_done, only_scores)
                }
            }
        });

        writer.join()
    })
    .map_err(|_| anyhow::anyhow!("matching thread panicked"))?;

    written.map_err(|_| anyhow::anyhow!("writer thread panicked"))?
}

fn print_into_stream(
    output: &mut impl Write,
    rx: crossbeam::channel::Receiver<MatchResult>,
    only_scores: bool,
) -> anyhow::Result<()> {
    for MatchResult {
        probe,
        gallery,
        score,
    } in rx
    {
        let score = score.map_or_else(|| "-1".to_owned(), |score| format!("{:.2}", score));
        if only_scores {
            writeln!(output, "{}", score)?;
        } else {
            writeln!(output, "{} {} {}", probe.display(), gallery.display(), score)?;
        }
    }
    output.flush()?;
    Ok(())
}

fn load(pipeline: &FeaturePipeline<Path>, path: &Path) -> Option<Features> {
    match pipeline.extract(path) {
        Ok(features) => Some(features),
        Err(e) => {
            log::warn!("cannot load {}: {}", path.display(), e);
            None
        }
    }
}

fn single_match(matcher: &Matcher, probe: Option<&Features>, gallery: Option<&Features>) -> Option<f64> {
    let (probe, gallery) = (probe?, gallery?);
    match matcher.score(probe, gallery) {
        Ok(score) => Some(score),
        Err(e) => {
            log::warn!("matching failed: {}", e);
            None
        }
    }
}

/// Sends accepted results in comparison order, honoring the first-match modes.
fn send_in_order<'data>(
    options: &ExecuteOptions<'data, '_>,
    results: impl IntoIterator<Item = (&'data PathBuf, &'data PathBuf, Option<f64>)>,
) {
    let mut finished_probe: Option<&PathBuf> = None;
    for (probe, gallery, score) in results {
        if finished_probe == Some(probe) {
            continue;
        }
        if !options.accepts(score) {
            continue;
        }
        if options
            .match_done
            .send(MatchResult {
                probe,
                gallery,
                score,
            })
            .is_err()
        {
            return;
        }
        if options.match_mode == MatchMode::OnlyFirstMatch {
            match options.compare_mode {
                CompareMode::OneToMany => finished_probe = Some(probe),
                _ => return,
            }
        }
    }
}

fn execute_parallel(options: &ExecuteOptions) {
    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("cannot start thread pool: {}", e);
            return;
        }
    };

    let mut files: Vec<&PathBuf> = options.probes.iter().chain(options.galleries.iter()).collect();
    files.sort();
    files.dedup();

    let cache: HashMap<&Path, Features> = pool.install(|| {
        files
            .par_iter()
            .filter_map(|path| load(&options.pipeline, path).map(|features| (path.as_path(), features)))
            .collect()
    });
    log::info!("loaded {} of {} templates", cache.len(), files.len());

    let pairs = comparisons(options.probes, options.galleries, options.compare_mode);
    let score = |probe: &PathBuf, gallery: &PathBuf| {
        single_match(
            options.matcher,
            cache.get(probe.as_path()),
            cache.get(gallery.as_path()),
        )
    };

    if !options.relaxed_order {
        let scores: Vec<Option<f64>> =
            pool.install(|| pairs.par_iter().map(|&(probe, gallery)| score(probe, gallery)).collect());
        send_in_order(
            options,
            pairs
                .iter()
                .zip(scores)
                .map(|(&(probe, gallery), score)| (probe, gallery, score)),
        );
        return;
    }

    let (tx, rx) = crossbeam::channel::bounded::<(&PathBuf, &PathBuf)>(1000);
    let spawned = crossbeam::scope(|s| {
        for _ in 0..options.threads {
            let rx = rx.clone();
            let score = &score;
            s.spawn(move |_| {
                for (probe, gallery) in rx {
                    let score = score(probe, gallery);
                    if options.accepts(score) {
                        let sent = options.match_done.send(MatchResult {
                            probe,
                            gallery,
                            score,
                        });
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            });
        }

        // drop unused channel that would be blocking app termination
        drop(rx);

        s.spawn(move |_| {
            for pair in pairs {
                if tx.send(pair).is_err() {
                    break;
                }
            }
        });
    });
    if spawned.is_err() {
        log::error!("a matching worker panicked");
    }
}

fn execute_sequential(options: &ExecuteOptions) {
    let mut cache: HashMap<&Path, Option<Features>> = HashMap::new();

    let pairs = comparisons(options.probes, options.galleries, options.compare_mode);
    let results = pairs.into_iter().map(|(probe, gallery)| {
        for path in [probe, gallery] {
            cache
                .entry(path.as_path())
                .or_insert_with(|| load(&options.pipeline, path));
        }
        let score = single_match(
            options.matcher,
            cache[probe.as_path()].as_ref(),
            cache[gallery.as_path()].as_ref(),
        );
        (probe, gallery, score)
    });

    send_in_order(options, results);
}
