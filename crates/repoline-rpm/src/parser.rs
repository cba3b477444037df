//! RPM metadata parser producing repoline packages

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use repoline_core::extract::{HeaderRange, PackageParser};
use repoline_core::package::{
    ChangelogEntry, DepFlags, Dependency, FileKind, Package, PackageFile,
};
use repoline_core::ExtractError;

use crate::error::RpmError;
use crate::header::{self, Header, LEAD_SIZE};
use crate::tags;

const SENSE_LESS: u32 = 0x02;
const SENSE_GREATER: u32 = 0x04;
const SENSE_EQUAL: u32 = 0x08;
/// rpmlib() feature pseudo-dependencies, not real package requires.
const SENSE_RPMLIB: u32 = 1 << 24;

const S_IFMT: u16 = 0o170_000;
const S_IFDIR: u16 = 0o040_000;
/// %ghost files appear in the header but are not shipped in the payload.
const FILE_GHOST: u32 = 1 << 6;

/// Reader for the RPM container format. Stateless; one instance serves
/// the whole worker pool.
pub struct RpmParser;

impl RpmParser {
    fn read_main_header(path: &Path) -> Result<Header, RpmError> {
        let mut reader = BufReader::new(File::open(path)?);
        header::read_lead(&mut reader)?;
        let sig = header::read_preamble(&mut reader, "signature header")?;
        header::skip_section(&mut reader, sig, true)?;
        let main = header::read_preamble(&mut reader, "header")?;
        Header::read(&mut reader, main)
    }
}

impl PackageParser for RpmParser {
    fn parse(&self, path: &Path, changelog_limit: usize) -> Result<Package, ExtractError> {
        let hdr = Self::read_main_header(path)?;
        Ok(build_package(&hdr, changelog_limit)?)
    }

    fn header_range(&self, path: &Path) -> Result<HeaderRange, ExtractError> {
        Ok(read_header_range(path)?)
    }
}

/// Byte offsets of the main header: after the lead and the padded
/// signature header, through the end of the header store.
fn read_header_range(path: &Path) -> Result<HeaderRange, RpmError> {
    let mut reader = BufReader::new(File::open(path)?);
    header::read_lead(&mut reader)?;
    let sig = header::read_preamble(&mut reader, "signature header")?;
    let start = LEAD_SIZE + sig.padded_section_size();
    header::skip_section(&mut reader, sig, true)?;
    let main = header::read_preamble(&mut reader, "header")?;
    let end = start + main.section_size();
    Ok(HeaderRange { start, end })
}

fn build_package(hdr: &Header, changelog_limit: usize) -> Result<Package, RpmError> {
    let mut pkg = Package {
        name: required_str(hdr, tags::NAME, "name")?,
        version: required_str(hdr, tags::VERSION, "version")?,
        release: required_str(hdr, tags::RELEASE, "release")?,
        // source packages carry no arch tag
        arch: optional_str(hdr, tags::ARCH)?.unwrap_or_else(|| "src".to_string()),
        epoch: hdr
            .u32_value(tags::EPOCH)?
            .map(|e| e.to_string())
            .unwrap_or_else(|| "0".to_string()),
        summary: optional_str(hdr, tags::SUMMARY)?.unwrap_or_default(),
        description: optional_str(hdr, tags::DESCRIPTION)?.unwrap_or_default(),
        packager: optional_str(hdr, tags::PACKAGER)?.unwrap_or_default(),
        url: optional_str(hdr, tags::URL)?.unwrap_or_default(),
        license: optional_str(hdr, tags::LICENSE)?.unwrap_or_default(),
        vendor: optional_str(hdr, tags::VENDOR)?.unwrap_or_default(),
        group: optional_str(hdr, tags::GROUP)?.unwrap_or_default(),
        buildhost: optional_str(hdr, tags::BUILDHOST)?.unwrap_or_default(),
        sourcerpm: optional_str(hdr, tags::SOURCERPM)?.unwrap_or_default(),
        time_build: hdr.u32_value(tags::BUILDTIME)?.unwrap_or(0) as i64,
        size_installed: hdr
            .u64_value(tags::LONGSIZE)?
            .or(hdr.u64_value(tags::SIZE)?)
            .unwrap_or(0),
        size_archive: hdr
            .u64_value(tags::LONGARCHIVESIZE)?
            .or(hdr.u64_value(tags::ARCHIVESIZE)?)
            .unwrap_or(0),
        ..Default::default()
    };

    pkg.files = read_files(hdr)?;
    pkg.changelogs = read_changelogs(hdr, changelog_limit)?;

    pkg.provides = dependencies(
        hdr,
        tags::PROVIDENAME,
        tags::PROVIDEFLAGS,
        tags::PROVIDEVERSION,
        false,
    )?;
    pkg.requires = dependencies(
        hdr,
        tags::REQUIRENAME,
        tags::REQUIREFLAGS,
        tags::REQUIREVERSION,
        true,
    )?;
    pkg.conflicts = dependencies(
        hdr,
        tags::CONFLICTNAME,
        tags::CONFLICTFLAGS,
        tags::CONFLICTVERSION,
        false,
    )?;
    pkg.obsoletes = dependencies(
        hdr,
        tags::OBSOLETENAME,
        tags::OBSOLETEFLAGS,
        tags::OBSOLETEVERSION,
        false,
    )?;

    Ok(pkg)
}

fn required_str(hdr: &Header, tag: u32, name: &'static str) -> Result<String, RpmError> {
    hdr.str_value(tag)?
        .map(str::to_string)
        .ok_or(RpmError::MissingTag(name))
}

fn optional_str(hdr: &Header, tag: u32) -> Result<Option<String>, RpmError> {
    Ok(hdr.str_value(tag)?.map(str::to_string))
}

/// Reassemble file paths from the compressed basenames/dirnames/dirindexes
/// triple, classifying directories and %ghost entries.
fn read_files(hdr: &Header) -> Result<Vec<PackageFile>, RpmError> {
    let basenames = hdr.str_array(tags::BASENAMES)?;
    let dirnames = hdr.str_array(tags::DIRNAMES)?;
    let dirindexes = hdr.u32_array(tags::DIRINDEXES)?;
    let modes = hdr.u16_array(tags::FILEMODES)?;
    let flags = hdr.u32_array(tags::FILEFLAGS)?;

    if basenames.len() != dirindexes.len() {
        return Err(RpmError::BadStore(format!(
            "{} basenames but {} dirindexes",
            basenames.len(),
            dirindexes.len()
        )));
    }

    let mut files = Vec::with_capacity(basenames.len());
    for (i, base) in basenames.iter().enumerate() {
        let dir = dirnames
            .get(dirindexes[i] as usize)
            .ok_or_else(|| RpmError::BadStore(format!("dirindex {} out of range", dirindexes[i])))?;
        let kind = if flags.get(i).is_some_and(|f| f & FILE_GHOST != 0) {
            FileKind::Ghost
        } else if modes.get(i).is_some_and(|m| m & S_IFMT == S_IFDIR) {
            FileKind::Dir
        } else {
            FileKind::File
        };
        files.push(PackageFile {
            path: format!("{dir}{base}"),
            kind,
        });
    }
    Ok(files)
}

/// Changelog entries are stored newest first; keep at most `limit`.
fn read_changelogs(hdr: &Header, limit: usize) -> Result<Vec<ChangelogEntry>, RpmError> {
    let times = hdr.u32_array(tags::CHANGELOGTIME)?;
    let names = hdr.str_array(tags::CHANGELOGNAME)?;
    let texts = hdr.str_array(tags::CHANGELOGTEXT)?;

    let count = times.len().min(names.len()).min(texts.len()).min(limit);
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        entries.push(ChangelogEntry {
            author: names[i].clone(),
            date: i64::from(times[i]),
            text: texts[i].clone(),
        });
    }
    Ok(entries)
}

fn dependencies(
    hdr: &Header,
    name_tag: u32,
    flags_tag: u32,
    version_tag: u32,
    skip_rpmlib: bool,
) -> Result<Vec<Dependency>, RpmError> {
    let names = hdr.str_array(name_tag)?;
    let senses = hdr.u32_array(flags_tag)?;
    let versions = hdr.str_array(version_tag)?;

    let mut deps = Vec::with_capacity(names.len());
    for (i, name) in names.into_iter().enumerate() {
        let sense = senses.get(i).copied().unwrap_or(0);
        if skip_rpmlib && sense & SENSE_RPMLIB != 0 {
            continue;
        }
        let mut dep = Dependency {
            name,
            ..Default::default()
        };
        if let Some(flags) = dep_flags(sense) {
            let evr = versions.get(i).map(String::as_str).unwrap_or("");
            let (epoch, version, release) = split_evr(evr);
            dep.flags = Some(flags);
            dep.epoch = epoch;
            dep.version = version;
            dep.release = release;
        }
        deps.push(dep);
    }
    Ok(deps)
}

fn dep_flags(sense: u32) -> Option<DepFlags> {
    match sense & (SENSE_LESS | SENSE_GREATER | SENSE_EQUAL) {
        x if x == SENSE_LESS => Some(DepFlags::Lt),
        x if x == SENSE_LESS | SENSE_EQUAL => Some(DepFlags::Le),
        x if x == SENSE_GREATER => Some(DepFlags::Gt),
        x if x == SENSE_GREATER | SENSE_EQUAL => Some(DepFlags::Ge),
        x if x == SENSE_EQUAL => Some(DepFlags::Eq),
        _ => None,
    }
}

/// Split an `[epoch:]version[-release]` string.
fn split_evr(evr: &str) -> (Option<String>, Option<String>, Option<String>) {
    if evr.is_empty() {
        return (None, None, None);
    }
    let (epoch, rest) = match evr.split_once(':') {
        Some((e, rest)) => (Some(e.to_string()), rest),
        None => (None, evr),
    };
    let (version, release) = match rest.split_once('-') {
        Some((v, r)) => (v.to_string(), Some(r.to_string())),
        None => (rest.to_string(), None),
    };
    (epoch, Some(version), release)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{rpm_file, HeaderBuilder};

    fn sample_header() -> Vec<u8> {
        HeaderBuilder::new()
            .string(tags::NAME, "tree")
            .string(tags::VERSION, "2.1.0")
            .string(tags::RELEASE, "1.fc40")
            .string(tags::ARCH, "x86_64")
            .u32s(tags::EPOCH, &[0])
            .i18n_string(tags::SUMMARY, "File tree viewer")
            .i18n_string(tags::DESCRIPTION, "Lists directories recursively")
            .u32s(tags::BUILDTIME, &[1700000000])
            .u32s(tags::SIZE, &[90210])
            .string(tags::LICENSE, "GPLv2+")
            .string(tags::SOURCERPM, "tree-2.1.0-1.fc40.src.rpm")
            .string_array(tags::DIRNAMES, &["/usr/bin/", "/usr/share/doc/", "/etc/"])
            .string_array(tags::BASENAMES, &["tree", "tree", "treerc"])
            .u32s(tags::DIRINDEXES, &[0, 1, 2])
            .u16s(tags::FILEMODES, &[0o100755, 0o040755, 0o100644])
            .u32s(tags::FILEFLAGS, &[0, 0, FILE_GHOST])
            .string_array(tags::PROVIDENAME, &["tree"])
            .u32s(tags::PROVIDEFLAGS, &[SENSE_EQUAL])
            .string_array(tags::PROVIDEVERSION, &["2.1.0-1.fc40"])
            .string_array(
                tags::REQUIRENAME,
                &["libc.so.6", "rpmlib(CompressedFileNames)"],
            )
            .u32s(tags::REQUIREFLAGS, &[0, SENSE_RPMLIB | SENSE_EQUAL])
            .string_array(tags::REQUIREVERSION, &["", "3.0.4-1"])
            .u32s(tags::CHANGELOGTIME, &[1700000000, 1600000000])
            .string_array(tags::CHANGELOGNAME, &["Jane - 2.1.0-1", "Jane - 2.0.0-1"])
            .string_array(tags::CHANGELOGTEXT, &["- update", "- initial"])
            .build()
    }

    fn write_rpm(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree-2.1.0-1.fc40.x86_64.rpm");
        std::fs::write(&path, bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn parse_full_package() {
        let (_dir, path) = write_rpm(&rpm_file(&sample_header(), 0));
        let pkg = RpmParser.parse(&path, 10).unwrap();

        assert_eq!(pkg.name, "tree");
        assert_eq!(pkg.version, "2.1.0");
        assert_eq!(pkg.release, "1.fc40");
        assert_eq!(pkg.arch, "x86_64");
        assert_eq!(pkg.epoch, "0");
        assert_eq!(pkg.summary, "File tree viewer");
        assert_eq!(pkg.time_build, 1700000000);
        assert_eq!(pkg.size_installed, 90210);
        assert_eq!(pkg.license, "GPLv2+");

        assert_eq!(pkg.files.len(), 3);
        assert_eq!(pkg.files[0].path, "/usr/bin/tree");
        assert_eq!(pkg.files[0].kind, FileKind::File);
        assert_eq!(pkg.files[1].path, "/usr/share/doc/tree");
        assert_eq!(pkg.files[1].kind, FileKind::Dir);
        assert_eq!(pkg.files[2].path, "/etc/treerc");
        assert_eq!(pkg.files[2].kind, FileKind::Ghost);

        assert_eq!(pkg.provides.len(), 1);
        assert_eq!(pkg.provides[0].flags, Some(DepFlags::Eq));
        assert_eq!(pkg.provides[0].version.as_deref(), Some("2.1.0"));
        assert_eq!(pkg.provides[0].release.as_deref(), Some("1.fc40"));

        // rpmlib() requires are filtered out
        assert_eq!(pkg.requires.len(), 1);
        assert_eq!(pkg.requires[0].name, "libc.so.6");
        assert_eq!(pkg.requires[0].flags, None);
    }

    #[test]
    fn changelog_limit_applies() {
        let (_dir, path) = write_rpm(&rpm_file(&sample_header(), 0));
        let pkg = RpmParser.parse(&path, 1).unwrap();
        assert_eq!(pkg.changelogs.len(), 1);
        assert_eq!(pkg.changelogs[0].text, "- update");

        let none = RpmParser.parse(&path, 0).unwrap();
        assert!(none.changelogs.is_empty());
    }

    #[test]
    fn header_range_accounts_for_sig_padding() {
        let main = sample_header();
        // 7-byte sig store → 23-byte section → padded to 24
        let (_dir, path) = write_rpm(&rpm_file(&main, 7));
        let range = RpmParser.header_range(&path).unwrap();
        assert_eq!(range.start, 96 + 24);
        assert_eq!(range.end, range.start + main.len() as u64);
    }

    #[test]
    fn not_an_rpm_is_parse_error() {
        let (_dir, path) = write_rpm(b"definitely not an rpm file at all, not even close");
        let err = RpmParser.parse(&path, 10).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn truncated_file_is_io_error() {
        let (_dir, path) = write_rpm(&rpm_file(&sample_header(), 0)[..100]);
        let err = RpmParser.parse(&path, 10).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn missing_name_is_rejected() {
        let hdr = HeaderBuilder::new()
            .string(tags::VERSION, "1.0")
            .string(tags::RELEASE, "1")
            .build();
        let (_dir, path) = write_rpm(&rpm_file(&hdr, 0));
        let err = RpmParser.parse(&path, 10).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
        assert!(format!("{err}").contains("name"));
    }

    #[test]
    fn wide_size_tag_preferred_over_narrow() {
        let hdr = HeaderBuilder::new()
            .string(tags::NAME, "big")
            .string(tags::VERSION, "1.0")
            .string(tags::RELEASE, "1")
            .u32s(tags::SIZE, &[123])
            .u64s(tags::LONGSIZE, &[8_589_934_592])
            .build();
        let (_dir, path) = write_rpm(&rpm_file(&hdr, 0));
        let pkg = RpmParser.parse(&path, 0).unwrap();
        assert_eq!(pkg.size_installed, 8_589_934_592);
    }

    #[test]
    fn source_package_arch_defaults_to_src() {
        let hdr = HeaderBuilder::new()
            .string(tags::NAME, "tree")
            .string(tags::VERSION, "2.1.0")
            .string(tags::RELEASE, "1.fc40")
            .build();
        let (_dir, path) = write_rpm(&rpm_file(&hdr, 0));
        let pkg = RpmParser.parse(&path, 10).unwrap();
        assert_eq!(pkg.arch, "src");
    }

    #[test]
    fn split_evr_variants() {
        assert_eq!(split_evr(""), (None, None, None));
        assert_eq!(split_evr("1.0"), (None, Some("1.0".into()), None));
        assert_eq!(
            split_evr("1.0-2"),
            (None, Some("1.0".into()), Some("2".into()))
        );
        assert_eq!(
            split_evr("3:1.0-2.fc40"),
            (
                Some("3".into()),
                Some("1.0".into()),
                Some("2.fc40".into())
            )
        );
    }

    #[test]
    fn dep_flag_combinations() {
        assert_eq!(dep_flags(0), None);
        assert_eq!(dep_flags(SENSE_LESS), Some(DepFlags::Lt));
        assert_eq!(dep_flags(SENSE_LESS | SENSE_EQUAL), Some(DepFlags::Le));
        assert_eq!(dep_flags(SENSE_GREATER), Some(DepFlags::Gt));
        assert_eq!(dep_flags(SENSE_GREATER | SENSE_EQUAL), Some(DepFlags::Ge));
        assert_eq!(dep_flags(SENSE_EQUAL), Some(DepFlags::Eq));
        // unrelated bits don't disturb the comparison sense
        assert_eq!(dep_flags(SENSE_EQUAL | (1 << 9)), Some(DepFlags::Eq));
    }
}
