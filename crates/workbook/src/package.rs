//! In-place patching of an `.xlsx` package.
//!
//! Each put sheet gets a freshly generated worksheet part. An existing sheet
//! keeps its part path, relationship ID and position; a new sheet is
//! registered in the workbook, its relationships and the content types.
//! Every other zip entry is copied through as raw compressed bytes.

use crate::error::{Result, WorkbookError};
use crate::model::{CellValue, Sheet};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const ROOT_RELS_PART: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// `<sheet>` entry of the workbook part
#[derive(Debug)]
struct ListedSheet {
    name: String,
    sheet_id: u32,
    rel_id: String,
}

/// `<Relationship>` entry with its target resolved to a package path
#[derive(Debug)]
struct Relationship {
    id: String,
    kind: String,
    target: String,
}

/// Rewrite the sheets named in `sheets` inside the `source` package.
pub(crate) fn patch(source: &[u8], sheets: &[&Sheet]) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(source))?;

    let workbook_part = workbook_part(&mut archive)?;
    let workbook_dir = part_dir(&workbook_part).to_string();
    let workbook_rels_part = rels_part(&workbook_part);
    let workbook_xml = required_part(&mut archive, &workbook_part)?;
    let rels_xml = required_part(&mut archive, &workbook_rels_part)?;
    let content_types_xml = required_part(&mut archive, CONTENT_TYPES_PART)?;

    let layout = SheetLayout::parse(&workbook_xml)?;
    let relationships = parse_relationships(&rels_xml, &workbook_dir)?;

    let mut part_names: HashSet<String> = archive.file_names().map(str::to_string).collect();
    let mut rel_ids: HashSet<String> = relationships.iter().map(|r| r.id.clone()).collect();
    let mut next_sheet_id = layout.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;

    let mut parts: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut dropped: HashSet<String> = HashSet::new();
    let mut renamed: HashMap<String, String> = HashMap::new();
    let mut new_sheets = Vec::new();
    let mut new_rels = Vec::new();
    let mut new_overrides = Vec::new();

    for sheet in sheets {
        let xml = worksheet_xml(sheet)?;
        let wanted = sheet.name.to_lowercase();
        match layout.sheets.iter().find(|s| s.name.to_lowercase() == wanted) {
            Some(listed) => {
                let rel = relationships
                    .iter()
                    .find(|r| r.id == listed.rel_id)
                    .ok_or_else(|| {
                        WorkbookError::Malformed(format!(
                            "sheet '{}' has no relationship {}",
                            listed.name, listed.rel_id
                        ))
                    })?;
                log::debug!("Rewriting part {} for sheet '{}'", rel.target, sheet.name);
                // Drawings, comments and tables of the old sheet no longer apply
                dropped.insert(rels_part(&rel.target));
                renamed.insert(listed.rel_id.clone(), sheet.name.clone());
                parts.insert(rel.target.clone(), xml);
            }
            None => {
                let file =
                    unused(&part_names, |n| format!("{workbook_dir}worksheets/sheet{n}.xml"));
                let rel_id = unused(&rel_ids, |n| format!("rId{n}"));
                log::debug!("Adding part {file} for sheet '{}'", sheet.name);

                let mut element = BytesStart::new(layout.element.clone());
                element.push_attribute(("name", sheet.name.as_str()));
                element.push_attribute(("sheetId", next_sheet_id.to_string().as_str()));
                element.push_attribute((layout.rel_attr.as_str(), rel_id.as_str()));
                new_sheets.push(element);

                let mut rel = BytesStart::new("Relationship");
                rel.push_attribute(("Id", rel_id.as_str()));
                rel.push_attribute(("Type", WORKSHEET_REL_TYPE));
                rel.push_attribute(("Target", relative_target(&workbook_dir, &file)));
                new_rels.push(rel);

                let mut content_type = BytesStart::new("Override");
                content_type.push_attribute(("PartName", format!("/{file}").as_str()));
                content_type.push_attribute(("ContentType", WORKSHEET_CONTENT_TYPE));
                new_overrides.push(content_type);

                next_sheet_id += 1;
                part_names.insert(file.clone());
                rel_ids.insert(rel_id);
                parts.insert(file, xml);
            }
        }
    }

    // Excel rebuilds a missing calculation chain but rejects a stale one
    let calc_chain = if renamed.is_empty() {
        None
    } else {
        relationships.iter().find(|r| r.kind.ends_with("/calcChain"))
    };
    if let Some(rel) = calc_chain {
        dropped.insert(rel.target.clone());
    }
    let calc_rel_id = calc_chain.map(|r| r.id.as_str());
    let calc_part_name = calc_chain.map(|r| format!("/{}", r.target));

    let workbook_xml = rewrite(
        &workbook_xml,
        b"sheet",
        |element| match attribute(element, b"id")? {
            Some(id) => match renamed.get(&id) {
                Some(name) => Ok(Edit::Replace(with_attribute(element, b"name", name)?)),
                None => Ok(Edit::Keep),
            },
            None => Ok(Edit::Keep),
        },
        b"sheets",
        new_sheets,
    )?;
    let rels_xml = rewrite(
        &rels_xml,
        b"Relationship",
        |element| {
            let id = attribute(element, b"Id")?;
            Ok(if id.is_some() && id.as_deref() == calc_rel_id {
                Edit::Drop
            } else {
                Edit::Keep
            })
        },
        b"Relationships",
        new_rels,
    )?;
    let content_types_xml = rewrite(
        &content_types_xml,
        b"Override",
        |element| {
            let part = attribute(element, b"PartName")?;
            Ok(if part.is_some() && part == calc_part_name {
                Edit::Drop
            } else {
                Edit::Keep
            })
        },
        b"Types",
        new_overrides,
    )?;
    parts.insert(workbook_part, workbook_xml);
    parts.insert(workbook_rels_part, rels_xml);
    parts.insert(CONTENT_TYPES_PART.to_string(), content_types_xml);

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut out = ZipWriter::new(Cursor::new(Vec::with_capacity(source.len())));
    for idx in 0..archive.len() {
        let entry = archive.by_index_raw(idx)?;
        let name = entry.name().to_string();
        if dropped.contains(&name) {
            log::debug!("Dropping stale part {name}");
            continue;
        }
        match parts.remove(&name) {
            Some(data) => {
                out.start_file(name, options)?;
                out.write_all(&data)?;
            }
            None => out.raw_copy_file(entry)?,
        }
    }
    for (name, data) in parts {
        out.start_file(name, options)?;
        out.write_all(&data)?;
    }

    Ok(out.finish()?.into_inner())
}

/// The package's `<sheets>` listing plus the spelling its elements use
struct SheetLayout {
    sheets: Vec<ListedSheet>,
    element: String,
    rel_attr: String,
}

impl SheetLayout {
    fn parse(xml: &[u8]) -> Result<Self> {
        let mut layout = Self {
            sheets: Vec::new(),
            element: "sheet".to_string(),
            rel_attr: "r:id".to_string(),
        };
        for element in elements(xml, b"sheet")? {
            let name = attribute(&element, b"name")?.unwrap_or_default();
            let sheet_id = attribute(&element, b"sheetId")?
                .and_then(|id| id.parse().ok())
                .unwrap_or(0);
            let mut rel_id = None;
            for attr in element.attributes() {
                let attr = attr.map_err(quick_xml::Error::from)?;
                if attr.key.local_name().as_ref() == b"id" {
                    layout.rel_attr = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    rel_id = Some(attr.unescape_value()?.into_owned());
                }
            }
            let Some(rel_id) = rel_id else {
                return Err(WorkbookError::Malformed(format!(
                    "sheet '{name}' has no relationship ID"
                )));
            };
            layout.element = String::from_utf8_lossy(element.name().as_ref()).into_owned();
            layout.sheets.push(ListedSheet {
                name,
                sheet_id,
                rel_id,
            });
        }
        Ok(layout)
    }
}

fn parse_relationships(xml: &[u8], base_dir: &str) -> Result<Vec<Relationship>> {
    let mut rels = Vec::new();
    for element in elements(xml, b"Relationship")? {
        let (Some(id), Some(target)) = (
            attribute(&element, b"Id")?,
            attribute(&element, b"Target")?,
        ) else {
            continue;
        };
        rels.push(Relationship {
            id,
            kind: attribute(&element, b"Type")?.unwrap_or_default(),
            target: resolve_target(base_dir, &target),
        });
    }
    Ok(rels)
}

/// Path of the workbook part, as declared by the package root relationships.
fn workbook_part(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String> {
    let Some(xml) = read_part(archive, ROOT_RELS_PART)? else {
        return Ok(DEFAULT_WORKBOOK_PART.to_string());
    };
    Ok(parse_relationships(&xml, "")?
        .into_iter()
        .find(|r| r.kind.ends_with("/officeDocument"))
        .map(|r| r.target)
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string()))
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            Ok(Some(data))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn required_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Vec<u8>> {
    read_part(archive, name)?
        .ok_or_else(|| WorkbookError::Malformed(format!("package has no {name} part")))
}

/// "xl/workbook.xml" -> "xl/"
fn part_dir(part: &str) -> &str {
    part.rfind('/').map_or("", |idx| &part[..=idx])
}

/// "xl/workbook.xml" -> "xl/_rels/workbook.xml.rels"
fn rels_part(part: &str) -> String {
    let dir = part_dir(part);
    format!("{dir}_rels/{}.rels", &part[dir.len()..])
}

fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{base_dir}{target}"),
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn relative_target<'a>(base_dir: &str, part: &'a str) -> &'a str {
    part.strip_prefix(base_dir).unwrap_or(part)
}

fn unused(taken: &HashSet<String>, candidate: impl Fn(usize) -> String) -> String {
    let mut n = 1;
    loop {
        let name = candidate(n);
        if !taken.contains(&name) {
            return name;
        }
        n += 1;
    }
}

fn attribute(element: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Copy of `element` with the attribute named `local` set to `value`.
fn with_attribute(
    element: &BytesStart<'_>,
    local: &[u8],
    value: &str,
) -> Result<BytesStart<'static>> {
    let mut out = BytesStart::new(String::from_utf8_lossy(element.name().as_ref()).into_owned());
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == local {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            out.push_attribute((key.as_str(), value));
        } else {
            out.push_attribute(attr);
        }
    }
    Ok(out)
}

fn elements(xml: &[u8], local: &[u8]) -> Result<Vec<BytesStart<'static>>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut found = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == local => {
                found.push(e.into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(found)
}

enum Edit {
    Keep,
    Drop,
    Replace(BytesStart<'static>),
}

/// Stream `xml` through unchanged except for elements named `local`, which
/// `edit` may drop or replace. `appended` is written just before the closing
/// tag of `parent`.
fn rewrite(
    xml: &[u8],
    local: &[u8],
    mut edit: impl FnMut(&BytesStart<'_>) -> Result<Edit>,
    parent: &[u8],
    appended: Vec<BytesStart<'static>>,
) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut skipped = Vec::new();
    let mut appended = Some(appended);
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Empty(e) if e.local_name().as_ref() == local => match edit(&e)? {
                Edit::Keep => writer.write_event(Event::Empty(e))?,
                Edit::Drop => {}
                Edit::Replace(new) => writer.write_event(Event::Empty(new))?,
            },
            Event::Start(e) if e.local_name().as_ref() == local => match edit(&e)? {
                Edit::Keep => writer.write_event(Event::Start(e))?,
                Edit::Drop => {
                    let name = e.name().as_ref().to_vec();
                    reader.read_to_end_into(QName(&name), &mut skipped)?;
                }
                Edit::Replace(new) => writer.write_event(Event::Start(new))?,
            },
            Event::End(e) if e.local_name().as_ref() == parent => {
                for element in appended.take().into_iter().flatten() {
                    writer.write_event(Event::Empty(element))?;
                }
                writer.write_event(Event::End(e))?;
            }
            event => writer.write_event(event)?,
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

/// Worksheet part holding the values of `sheet`; text goes in as inline strings.
fn worksheet_xml(sheet: &Sheet) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    let mut root = BytesStart::new("worksheet");
    root.push_attribute(("xmlns", SPREADSHEET_NS));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;

    for (r, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(|cell| matches!(cell, CellValue::Empty)) {
            continue;
        }
        let row_ref = (r + 1).to_string();
        let mut start = BytesStart::new("row");
        start.push_attribute(("r", row_ref.as_str()));
        writer.write_event(Event::Start(start))?;
        for (c, cell) in row.iter().enumerate() {
            write_cell(&mut writer, &format!("{}{row_ref}", column_name(c)), cell)?;
        }
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(writer.into_inner())
}

fn write_cell(writer: &mut Writer<Vec<u8>>, reference: &str, cell: &CellValue) -> Result<()> {
    let (kind, value) = match cell {
        CellValue::Empty => return Ok(()),
        CellValue::Text(text) => (Some("inlineStr"), xml_chars(text)),
        CellValue::Number(n) if n.is_finite() => (None, n.to_string()),
        CellValue::Number(n) => (Some("inlineStr"), n.to_string()),
        CellValue::Bool(b) => (Some("b"), if *b { "1" } else { "0" }.to_string()),
    };

    let mut start = BytesStart::new("c");
    start.push_attribute(("r", reference));
    if let Some(kind) = kind {
        start.push_attribute(("t", kind));
    }
    writer.write_event(Event::Start(start))?;
    if kind == Some("inlineStr") {
        writer.write_event(Event::Start(BytesStart::new("is")))?;
        let mut text = BytesStart::new("t");
        text.push_attribute(("xml:space", "preserve"));
        writer.write_event(Event::Start(text))?;
        writer.write_event(Event::Text(BytesText::new(&value)))?;
        writer.write_event(Event::End(BytesEnd::new("t")))?;
        writer.write_event(Event::End(BytesEnd::new("is")))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new("v")))?;
        writer.write_event(Event::Text(BytesText::new(&value)))?;
        writer.write_event(Event::End(BytesEnd::new("v")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

/// Zero-based column index to its letter name: 0 -> A, 26 -> AA.
fn column_name(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(char::from(b'A' + (idx % 26) as u8));
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// Strip characters XML 1.0 cannot carry.
fn xml_chars(text: &str) -> String {
    text.chars()
        .filter(|c| match c {
            '\t' | '\n' | '\r' => true,
            '\u{FFFE}' | '\u{FFFF}' => false,
            c => *c >= ' ',
        })
        .collect()
}
