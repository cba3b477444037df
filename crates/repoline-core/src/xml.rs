//! XML chunk generation for the primary, filelists and other streams
//!
//! Every function here is a pure mapping from a [`Package`] to bytes:
//! the same package always renders to the same chunk, which is what makes
//! parallel runs byte-identical to serial ones.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::FormatError;
use crate::package::{Dependency, Package};

/// The three per-package XML chunks, one per output stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct XmlTriple {
    pub primary: String,
    pub filelists: String,
    pub other: String,
}

/// Render all three chunks for one package.
pub fn dump(pkg: &Package) -> Result<XmlTriple, FormatError> {
    Ok(XmlTriple {
        primary: dump_primary(pkg)?,
        filelists: dump_filelists(pkg)?,
        other: dump_other(pkg)?,
    })
}

/// Files listed directly in the primary stream: config and command paths.
pub fn is_primary_file(path: &str) -> bool {
    path.starts_with("/etc/") || path == "/usr/lib/sendmail" || path.contains("bin/")
}

fn xml_err(e: impl std::fmt::Display) -> FormatError {
    FormatError::Xml(e.to_string())
}

type XmlWriter = Writer<Vec<u8>>;

fn start(w: &mut XmlWriter, el: BytesStart<'_>) -> Result<(), FormatError> {
    w.write_event(Event::Start(el)).map_err(xml_err)
}

fn empty(w: &mut XmlWriter, el: BytesStart<'_>) -> Result<(), FormatError> {
    w.write_event(Event::Empty(el)).map_err(xml_err)
}

fn end(w: &mut XmlWriter, name: &str) -> Result<(), FormatError> {
    w.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)
}

fn text(w: &mut XmlWriter, value: &str) -> Result<(), FormatError> {
    w.write_event(Event::Text(BytesText::new(value)))
        .map_err(xml_err)
}

fn text_element(w: &mut XmlWriter, name: &str, value: &str) -> Result<(), FormatError> {
    start(w, BytesStart::new(name))?;
    text(w, value)?;
    end(w, name)
}

fn version_element(w: &mut XmlWriter, pkg: &Package) -> Result<(), FormatError> {
    let mut el = BytesStart::new("version");
    el.push_attribute(("epoch", pkg.epoch.as_str()));
    el.push_attribute(("ver", pkg.version.as_str()));
    el.push_attribute(("rel", pkg.release.as_str()));
    empty(w, el)
}

fn finish(w: XmlWriter) -> Result<String, FormatError> {
    let mut out = String::from_utf8(w.into_inner()).map_err(xml_err)?;
    out.push('\n');
    Ok(out)
}

fn dep_entries(w: &mut XmlWriter, name: &str, deps: &[Dependency]) -> Result<(), FormatError> {
    if deps.is_empty() {
        return Ok(());
    }
    start(w, BytesStart::new(name))?;
    for dep in deps {
        let mut el = BytesStart::new("rpm:entry");
        el.push_attribute(("name", dep.name.as_str()));
        if let Some(flags) = dep.flags {
            el.push_attribute(("flags", flags.as_str()));
            el.push_attribute(("epoch", dep.epoch.as_deref().unwrap_or("0")));
            if let Some(ver) = dep.version.as_deref() {
                el.push_attribute(("ver", ver));
            }
            if let Some(rel) = dep.release.as_deref() {
                el.push_attribute(("rel", rel));
            }
        }
        empty(w, el)?;
    }
    end(w, name)
}

fn dump_primary(pkg: &Package) -> Result<String, FormatError> {
    let mut w = Writer::new(Vec::new());

    let mut package = BytesStart::new("package");
    package.push_attribute(("type", "rpm"));
    start(&mut w, package)?;

    text_element(&mut w, "name", &pkg.name)?;
    text_element(&mut w, "arch", &pkg.arch)?;
    version_element(&mut w, pkg)?;

    let mut checksum = BytesStart::new("checksum");
    checksum.push_attribute(("type", pkg.checksum_kind.as_str()));
    checksum.push_attribute(("pkgid", "YES"));
    start(&mut w, checksum)?;
    text(&mut w, &pkg.pkg_id)?;
    end(&mut w, "checksum")?;

    text_element(&mut w, "summary", &pkg.summary)?;
    text_element(&mut w, "description", &pkg.description)?;
    text_element(&mut w, "packager", &pkg.packager)?;
    text_element(&mut w, "url", &pkg.url)?;

    let mut time = BytesStart::new("time");
    time.push_attribute(("file", pkg.time_file.to_string().as_str()));
    time.push_attribute(("build", pkg.time_build.to_string().as_str()));
    empty(&mut w, time)?;

    let mut size = BytesStart::new("size");
    size.push_attribute(("package", pkg.size_package.to_string().as_str()));
    size.push_attribute(("installed", pkg.size_installed.to_string().as_str()));
    size.push_attribute(("archive", pkg.size_archive.to_string().as_str()));
    empty(&mut w, size)?;

    let mut location = BytesStart::new("location");
    if let Some(base) = pkg.location_base.as_deref() {
        location.push_attribute(("xml:base", base));
    }
    location.push_attribute(("href", pkg.location_href.as_str()));
    empty(&mut w, location)?;

    start(&mut w, BytesStart::new("format"))?;
    text_element(&mut w, "rpm:license", &pkg.license)?;
    text_element(&mut w, "rpm:vendor", &pkg.vendor)?;
    text_element(&mut w, "rpm:group", &pkg.group)?;
    text_element(&mut w, "rpm:buildhost", &pkg.buildhost)?;
    text_element(&mut w, "rpm:sourcerpm", &pkg.sourcerpm)?;

    let mut range = BytesStart::new("rpm:header-range");
    range.push_attribute(("start", pkg.header_start.to_string().as_str()));
    range.push_attribute(("end", pkg.header_end.to_string().as_str()));
    empty(&mut w, range)?;

    dep_entries(&mut w, "rpm:provides", &pkg.provides)?;
    dep_entries(&mut w, "rpm:requires", &pkg.requires)?;
    dep_entries(&mut w, "rpm:conflicts", &pkg.conflicts)?;
    dep_entries(&mut w, "rpm:obsoletes", &pkg.obsoletes)?;

    for file in pkg.files.iter().filter(|f| is_primary_file(&f.path)) {
        let mut el = BytesStart::new("file");
        if let Some(kind) = file.kind.type_attr() {
            el.push_attribute(("type", kind));
        }
        start(&mut w, el)?;
        text(&mut w, &file.path)?;
        end(&mut w, "file")?;
    }

    end(&mut w, "format")?;
    end(&mut w, "package")?;
    finish(w)
}

fn pkgid_package_start(pkg: &Package) -> BytesStart<'_> {
    let mut el = BytesStart::new("package");
    el.push_attribute(("pkgid", pkg.pkg_id.as_str()));
    el.push_attribute(("name", pkg.name.as_str()));
    el.push_attribute(("arch", pkg.arch.as_str()));
    el
}

fn dump_filelists(pkg: &Package) -> Result<String, FormatError> {
    let mut w = Writer::new(Vec::new());

    start(&mut w, pkgid_package_start(pkg))?;
    version_element(&mut w, pkg)?;

    for file in &pkg.files {
        let mut el = BytesStart::new("file");
        if let Some(kind) = file.kind.type_attr() {
            el.push_attribute(("type", kind));
        }
        start(&mut w, el)?;
        text(&mut w, &file.path)?;
        end(&mut w, "file")?;
    }

    end(&mut w, "package")?;
    finish(w)
}

fn dump_other(pkg: &Package) -> Result<String, FormatError> {
    let mut w = Writer::new(Vec::new());

    start(&mut w, pkgid_package_start(pkg))?;
    version_element(&mut w, pkg)?;

    for entry in &pkg.changelogs {
        let mut el = BytesStart::new("changelog");
        el.push_attribute(("author", entry.author.as_str()));
        el.push_attribute(("date", entry.date.to_string().as_str()));
        start(&mut w, el)?;
        text(&mut w, &entry.text)?;
        end(&mut w, "changelog")?;
    }

    end(&mut w, "package")?;
    finish(w)
}
