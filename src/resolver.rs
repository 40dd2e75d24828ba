use crate::{
    catalog::Catalog,
    file::{File, base_name, extension, stem},
};
use rand::Rng;
use std::str::FromStr;
use tracing::{info, warn};

/// Draws allowed before settling for an entry with the requested stem.
pub const MAX_ATTEMPTS: usize = 10;

/// How a bucket with a single entry is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SingletonPolicy {
    /// Draw from it anyway, which can only ever return that entry.
    #[default]
    Substitute,
    /// Buckets with fewer than two entries are served literally.
    Literal,
}

impl FromStr for SingletonPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "substitute" => Ok(Self::Substitute),
            "literal" => Ok(Self::Literal),
            other => Err(format!("Unknown singleton policy: {other}")),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Resolution {
    /// Serve exactly what was asked for.
    Literal,
    /// Serve this file instead. Its name keeps the requested extension.
    Substitute(File),
    NotFound,
}

pub struct Resolver {
    protected_names: Vec<String>,
    singleton_policy: SingletonPolicy,
}

impl Resolver {
    pub fn new(protected_names: Vec<String>, singleton_policy: SingletonPolicy) -> Self {
        Self {
            protected_names,
            singleton_policy,
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        let base = base_name(path);
        path == "/" || self.protected_names.iter().any(|name| name == base)
    }

    /// Picks what to serve for an already decoded request path.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        path: &str,
        catalog: &Catalog,
        rng: &mut R,
    ) -> Resolution {
        if self.is_protected(path) {
            return Resolution::Literal;
        }

        let requested_extension = extension(path).unwrap_or_default();
        let bucket = match catalog.bucket(requested_extension) {
            Some(bucket) if !bucket.is_empty() => bucket,
            _ => {
                warn!("Request for {path} matched nothing");
                return Resolution::NotFound;
            }
        };

        if bucket.len() < 2 && self.singleton_policy == SingletonPolicy::Literal {
            return Resolution::Literal;
        }

        let (selected, attempts) = select(bucket, stem(path), rng);
        let substitute = File::new(
            format!("{}{requested_extension}", selected.stem()),
            selected.location.clone(),
        );

        info!(
            "Request for {path} substituted with {} after {attempts} draws",
            substitute.name,
        );

        Resolution::Substitute(substitute)
    }
}

/// Draws until an entry's stem differs from `stem`, returning the last draw and the draw count.
fn select<'a, R: Rng + ?Sized>(
    bucket: &'a [File],
    stem: &str,
    rng: &mut R,
) -> (&'a File, usize) {
    let mut selected = &bucket[rng.random_range(0..bucket.len())];
    let mut attempts = 1;

    while attempts < MAX_ATTEMPTS && selected.stem() == stem {
        selected = &bucket[rng.random_range(0..bucket.len())];
        attempts += 1;
    }

    (selected, attempts)
}
