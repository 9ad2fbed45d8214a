use std::io::Write;
use std::path::Path;

use fingermatch::{Error, Features, Matcher, MatcherConfig};
use tools::{file_pipeline, init_logging, MAX_MINUTIAE};

#[repr(i32)]
enum ErrorCode {
    Success = 0,
    SyntaxError = 1,
    CannotOpenOutputFile = 2,
    CannotOpenTemplateFile = 3,
    CannotUpdateOutputFile = 4,
    SetupError = 101,
}

fn load(matcher: &Matcher, path: &str) -> Result<Features, ErrorCode> {
    let pipeline = file_pipeline(matcher.config(), MAX_MINUTIAE);
    pipeline.extract(Path::new(path)).map_err(|e| {
        log::error!("cannot load {}: {}", path, e);
        match e {
            Error::Io(_) => ErrorCode::CannotOpenTemplateFile,
            _ => ErrorCode::SetupError,
        }
    })
}

/// Score of `probe` against `gallery` relative to the weaker of both self-matches.
fn normalized_score(matcher: &Matcher, probe: &Features, gallery: &Features) -> Option<f64> {
    let probe_max = matcher.score(probe, probe).ok()?;
    let gallery_max = matcher.score(gallery, gallery).ok()?;
    let score = matcher.score(probe, gallery).ok()?;
    let max_score = probe_max.min(gallery_max);
    if max_score <= 0.0 {
        return None;
    }
    Some((score / max_score).clamp(0.0, 1.0))
}

fn run() -> ErrorCode {
    init_logging();

    let args: Vec<_> = std::env::args().skip(1).collect();
    let (in1, in2, out) = if let [in1, in2, out] = args.as_slice() {
        (in1, in2, out)
    } else {
        print!("\nSyntax error.\nUse: Match <templatefile1> <templatefile2> <outputfile>\n");
        return ErrorCode::SyntaxError;
    };

    let result = std::panic::catch_unwind(|| -> Result<Option<f64>, ErrorCode> {
        let matcher = Matcher::new(MatcherConfig::default()).map_err(|_| ErrorCode::SetupError)?;
        let probe = load(&matcher, in1)?;
        let gallery = load(&matcher, in2)?;
        Ok(normalized_score(&matcher, &probe, &gallery))
    });
    let score = match result {
        Ok(Ok(score)) => score,
        Ok(Err(code)) => return code,
        Err(_) => None,
    };

    let mut file = match std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(out)
    {
        Ok(f) => f,
        Err(_) => return ErrorCode::CannotOpenOutputFile,
    };

    match writeln!(
        &mut file,
        "{:>15} {:>15} {:>4} {:.6}",
        in1,
        in2,
        if score.is_some() { "OK" } else { "FAIL" },
        score.unwrap_or(0.0)
    ) {
        Ok(_) => ErrorCode::Success,
        Err(_) => ErrorCode::CannotUpdateOutputFile,
    }
}

fn main() {
    std::process::exit(run() as i32);
}
