//! Font discovery shared by the PDF layout and the chart renderer.
//!
//! Both `genpdf` and the chart backend need real TrueType data: the layout engine for glyph
//! metrics and embedding, the charts for rasterising labels.  Fonts are loaded once into a
//! [`FontSet`] holding the raw bytes of all four faces so the two consumers always agree on the
//! typeface.
//!
//! Search order:
//!
//! 1. the directory named by `IMPACT_REPORT_FONTS_DIR` (Roboto file names),
//! 2. `assets/fonts` next to the running executable, then under the crate root (Roboto),
//! 3. well-known system locations of Liberation Sans, then DejaVu Sans.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::Error;
use genpdf::fonts::{FontData, FontFamily};
use log::{debug, info};

/// Environment variable that overrides the bundled font directory.
pub const FONTS_DIR_ENV: &str = "IMPACT_REPORT_FONTS_DIR";

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// File names of the four faces of one family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceFiles {
    pub regular: &'static str,
    pub bold: &'static str,
    pub italic: &'static str,
    pub bold_italic: &'static str,
}

impl FaceFiles {
    fn all(&self) -> [&'static str; 4] {
        [self.regular, self.bold, self.italic, self.bold_italic]
    }
}

const ROBOTO_FILES: FaceFiles = FaceFiles {
    regular: "Roboto-Regular.ttf",
    bold: "Roboto-Bold.ttf",
    italic: "Roboto-Italic.ttf",
    bold_italic: "Roboto-BoldItalic.ttf",
};

const LIBERATION_FILES: FaceFiles = FaceFiles {
    regular: "LiberationSans-Regular.ttf",
    bold: "LiberationSans-Bold.ttf",
    italic: "LiberationSans-Italic.ttf",
    bold_italic: "LiberationSans-BoldItalic.ttf",
};

const DEJAVU_FILES: FaceFiles = FaceFiles {
    regular: "DejaVuSans.ttf",
    bold: "DejaVuSans-Bold.ttf",
    italic: "DejaVuSans-Oblique.ttf",
    bold_italic: "DejaVuSans-BoldOblique.ttf",
};

const DEJAVU_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/dejavu",
    "/usr/share/fonts/dejavu-sans-fonts",
    "/usr/share/fonts/TTF",
];

const LIBERATION_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/liberation2",
    "/usr/share/fonts/liberation-sans",
    "/usr/share/fonts/liberation",
    "/usr/share/fonts/TTF",
];

/// A directory that may contain a usable font family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontCandidate {
    pub family: &'static str,
    pub directory: PathBuf,
    pub files: FaceFiles,
}

impl FontCandidate {
    fn missing_files(&self) -> Vec<&'static str> {
        self.files
            .all()
            .into_iter()
            .filter(|name| !self.directory.join(name).is_file())
            .collect()
    }
}

/// Raw TrueType data of a complete font family.
#[derive(Clone)]
pub struct FontSet {
    family: &'static str,
    directory: PathBuf,
    regular: Vec<u8>,
    bold: Vec<u8>,
    italic: Vec<u8>,
    bold_italic: Vec<u8>,
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet")
            .field("family", &self.family)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl FontSet {
    /// Reads all four faces described by `candidate`.
    pub fn load(candidate: &FontCandidate) -> Result<Self, Error> {
        let read = |file: &str| {
            let path = candidate.directory.join(file);
            fs::read(&path).map_err(|err| {
                Error::new(format!("Failed to read font file {}", path.display()), err)
            })
        };

        Ok(Self {
            family: candidate.family,
            directory: candidate.directory.clone(),
            regular: read(candidate.files.regular)?,
            bold: read(candidate.files.bold)?,
            italic: read(candidate.files.italic)?,
            bold_italic: read(candidate.files.bold_italic)?,
        })
    }

    /// Name of the loaded family.
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Directory the faces were read from.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn regular(&self) -> &[u8] {
        &self.regular
    }

    pub fn bold(&self) -> &[u8] {
        &self.bold
    }

    /// Builds the `genpdf` font family. Glyph data is embedded into the output PDF.
    pub fn to_font_family(&self) -> Result<FontFamily<FontData>, Error> {
        let face = |bytes: &[u8], style: &str| {
            FontData::new(bytes.to_vec(), None).map_err(|err| {
                Error::new(
                    format!(
                        "Failed to parse {} {} font from {}: {}",
                        self.family,
                        style,
                        self.directory.display(),
                        err
                    ),
                    io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
                )
            })
        };

        Ok(FontFamily {
            regular: face(&self.regular, "regular")?,
            bold: face(&self.bold, "bold")?,
            italic: face(&self.italic, "italic")?,
            bold_italic: face(&self.bold_italic, "bold italic")?,
        })
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

/// Lists every location searched for fonts, in priority order.
pub fn font_candidates() -> Vec<FontCandidate> {
    let mut candidates: Vec<FontCandidate> = Vec::new();
    let mut push = |family, directory: PathBuf, files| {
        if !candidates.iter().any(|c| c.directory == directory && c.files == files) {
            candidates.push(FontCandidate {
                family,
                directory,
                files,
            });
        }
    };

    if let Some(path) = env_path(FONTS_DIR_ENV) {
        push(DEFAULT_FONT_FAMILY_NAME, path, ROBOTO_FILES);
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            push(
                DEFAULT_FONT_FAMILY_NAME,
                bin_dir.join("assets/fonts"),
                ROBOTO_FILES,
            );
        }
    }

    push(
        DEFAULT_FONT_FAMILY_NAME,
        bundled_fonts_source_dir(),
        ROBOTO_FILES,
    );

    for dir in LIBERATION_DIRS {
        push("LiberationSans", PathBuf::from(dir), LIBERATION_FILES);
    }
    for dir in DEJAVU_DIRS {
        push("DejaVuSans", PathBuf::from(dir), DEJAVU_FILES);
    }

    candidates
}

/// Directory holding the fonts shipped with the crate sources.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn resolve_candidate() -> Result<FontCandidate, Error> {
    let mut attempts = Vec::new();

    for candidate in font_candidates() {
        if !candidate.directory.is_dir() {
            attempts.push(format!(
                "{} (directory missing)",
                candidate.directory.display()
            ));
            continue;
        }

        let missing = candidate.missing_files();
        if missing.is_empty() {
            return Ok(candidate);
        }
        attempts.push(format!(
            "{} (missing files [{}])",
            candidate.directory.display(),
            missing.join(", ")
        ));
    }

    Err(Error::new(
        format!(
            "Unable to locate a font family. Checked: {}. See assets/fonts/README.md or set {}.",
            attempts.join(", "),
            FONTS_DIR_ENV
        ),
        io::Error::new(io::ErrorKind::NotFound, "no usable font family found"),
    ))
}

/// Loads the first complete font family found on the search path.
pub fn default_font_set() -> Result<FontSet, Error> {
    let candidate = resolve_candidate()?;
    debug!(
        "Loading {} fonts from {}",
        candidate.family,
        candidate.directory.display()
    );
    let set = FontSet::load(&candidate)?;
    info!(
        "Using {} font family from {}",
        set.family(),
        set.directory().display()
    );
    Ok(set)
}

/// Indicates whether any complete font family is available on the search path.
pub fn default_fonts_available() -> bool {
    resolve_candidate().is_ok()
}
