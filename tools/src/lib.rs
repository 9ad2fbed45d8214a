use std::ffi::OsStr;
use std::path::Path;

use anyhow::Context;

use fingermatch::parsing::RawMinutia;
use fingermatch::{
    parse, prune, Error, FeaturePipeline, MatcherConfig, Minutia, MinutiaKind,
};
use isoparser::{load_iso, MinutiaType, ParseError};

/// Largest number of minutiae read from any file.
pub const MAX_MINUTIAE: usize = 200;

pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Matcher configuration from a JSON file, or from a named preset when no file is given.
pub fn load_config(preset: &str, file: Option<&Path>) -> anyhow::Result<MatcherConfig> {
    let config = match file {
        Some(file) => {
            let reader = std::fs::File::open(file)
                .with_context(|| format!("cannot open config file {}", file.display()))?;
            serde_json::from_reader(std::io::BufReader::new(reader))
                .with_context(|| format!("cannot parse config file {}", file.display()))?
        }
        None => MatcherConfig::preset(preset)
            .with_context(|| format!("unknown matcher `{}`", preset))?,
    };
    config.validate().context("invalid matcher configuration")?;
    log::debug!("matcher configuration: {:?}", config);
    Ok(config)
}

fn convert_iso_error(error: ParseError) -> Error {
    match error {
        ParseError::Io(e) => Error::Io(e),
        other => Error::MalformedTemplate(other.to_string()),
    }
}

fn load_iso_minutiae(path: &Path) -> fingermatch::Result<Vec<RawMinutia>> {
    let record = load_iso(path).map_err(convert_iso_error)?;
    let view = record
        .views
        .first()
        .ok_or_else(|| Error::MalformedTemplate("record has no finger view".into()))?;

    Ok(view
        .minutiae
        .iter()
        .map(|m| RawMinutia {
            x: m.x as i32,
            y: m.y as i32,
            t: m.angle.round() as i32,
            q: m.quality as i32,
            kind: match m.ty {
                MinutiaType::Other => MinutiaKind::Unknown,
                MinutiaType::RidgeEnding => MinutiaKind::End,
                MinutiaType::RidgeBifurcation => MinutiaKind::Bifurcation,
            },
        })
        .collect())
}

/// Reads a NIST `.xyt` file or, for any other extension, an ISO finger minutiae
/// record, keeping the `max_minutiae` minutiae of best quality.
pub fn load_minutiae(path: &Path, max_minutiae: usize) -> fingermatch::Result<Vec<Minutia>> {
    let raw = if path.extension().and_then(OsStr::to_str) == Some("xyt") {
        parse(path)?
    } else {
        load_iso_minutiae(path)?
    };
    Ok(prune(&raw, max_minutiae))
}

/// Pipeline turning template files into features for `config`.
pub fn file_pipeline(config: &MatcherConfig, max_minutiae: usize) -> FeaturePipeline<Path> {
    FeaturePipeline::new(config)
        .with_minutia_source(move |path: &Path| load_minutiae(path, max_minutiae))
}
