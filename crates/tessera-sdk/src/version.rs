//! Plugin version parsing.
//!
//! Plugin versions are free-form `MAJOR.MINOR[.PATCH]` strings that often
//! carry package-index suffixes (`1.0a1`, `2.0.post1`, `v3.1`). They are
//! parsed into [`semver::Version`] with the suffixes folded into the
//! pre-release and build fields so that plain `Ord` gives
//! `1.0.dev1 < 1.0a1 < 1.0b1 < 1.0rc1 < 1.0 < 1.0.post1 < 1.1`.
//!
//! Pre-release fields are encoded as `phase.n.final.dev`, where `phase` is
//! 0 for dev-only releases and 1 to 3 for alpha, beta and release
//! candidates. Post releases become build metadata `n.final.dev`. Every
//! field is numeric and the field count is fixed, so semver precedence
//! matches package-index precedence.

use semver::{BuildMetadata, Prerelease, Version};

const PRE_LABELS: &[(&str, u64)] = &[
    ("alpha", 1),
    ("a", 1),
    ("beta", 2),
    ("b", 2),
    ("preview", 3),
    ("pre", 3),
    ("rc", 3),
    ("c", 3),
];
const POST_LABELS: &[(&str, u64)] = &[("post", 0), ("rev", 0), ("r", 0)];
const DEV_LABELS: &[(&str, u64)] = &[("dev", 0)];

const DEV_ONLY_PHASE: u64 = 0;

/// Parse a plugin version into a totally ordered [`Version`].
///
/// Accepts a leading `v`, leading zeros, two or three release components
/// (two are padded with `.0`) and pre, post and dev suffixes. A local
/// `+label` is ignored. Strings that fit none of that must be strict
/// semver.
pub(crate) fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    parse_release(raw).or_else(|| Version::parse(raw).ok())
}

fn parse_release(raw: &str) -> Option<Version> {
    let lowered = raw.to_ascii_lowercase();
    let public = lowered.split_once('+').map_or(lowered.as_str(), |(p, _)| p);
    let mut cursor = Cursor(public.strip_prefix('v').unwrap_or(public));

    let mut release = vec![cursor.number()?];
    while let Some(n) = cursor.attempt(|c| {
        c.0 = c.0.strip_prefix('.')?;
        c.number()
    }) {
        release.push(n);
    }
    if !(2..=3).contains(&release.len()) {
        return None;
    }
    release.resize(3, 0);

    let pre = cursor.attempt(|c| c.tagged(PRE_LABELS));
    let post = cursor
        .attempt(|c| c.tagged(POST_LABELS))
        .map(|(_, n)| n)
        .or_else(|| {
            cursor.attempt(|c| {
                c.0 = c.0.strip_prefix('-')?;
                c.number()
            })
        });
    let dev = cursor.attempt(|c| c.tagged(DEV_LABELS)).map(|(_, n)| n);
    if !cursor.0.is_empty() {
        return None;
    }

    // A dev suffix attaches to the post release if there is one, else the pre-release.
    let dev_fields = dev.map_or_else(|| "1.0".to_string(), |m| format!("0.{m}"));
    let (pre, build) = match (pre, post) {
        (Some((phase, n)), Some(p)) => (format!("{phase}.{n}.1.0"), format!("{p}.{dev_fields}")),
        (Some((phase, n)), None) => (format!("{phase}.{n}.{dev_fields}"), String::new()),
        (None, Some(p)) => (String::new(), format!("{p}.{dev_fields}")),
        (None, None) => (
            dev.map(|m| format!("{DEV_ONLY_PHASE}.0.0.{m}")).unwrap_or_default(),
            String::new(),
        ),
    };

    let mut version = Version::new(release[0], release[1], release[2]);
    if !pre.is_empty() {
        version.pre = Prerelease::new(&pre).ok()?;
    }
    if !build.is_empty() {
        version.build = BuildMetadata::new(&build).ok()?;
    }
    Some(version)
}

#[derive(Clone, Copy)]
struct Cursor<'a>(&'a str);

impl Cursor<'_> {
    /// Run `step` on a copy and keep its progress only if it succeeds.
    fn attempt<T>(&mut self, step: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let mut scratch = *self;
        let value = step(&mut scratch)?;
        *self = scratch;
        Some(value)
    }

    fn number(&mut self) -> Option<u64> {
        let end = self
            .0
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.0.len());
        let (digits, rest) = self.0.split_at(end);
        let n = digits.parse().ok()?;
        self.0 = rest;
        Some(n)
    }

    fn separator(&mut self) {
        if let Some(rest) = self.0.strip_prefix(['.', '-', '_']) {
            self.0 = rest;
        }
    }

    /// `[sep] label [[sep] n]`, returning the label's rank and `n` (default 0).
    fn tagged(&mut self, labels: &[(&str, u64)]) -> Option<(u64, u64)> {
        self.separator();
        let (rank, rest) = labels.iter().find_map(|(label, rank)| {
            let rest = self.0.strip_prefix(label)?;
            (!rest.starts_with(|c: char| c.is_ascii_alphabetic())).then_some((*rank, rest))
        })?;
        self.0 = rest;
        let n = self
            .attempt(|c| {
                c.separator();
                c.number()
            })
            .unwrap_or(0);
        Some((rank, n))
    }
}
