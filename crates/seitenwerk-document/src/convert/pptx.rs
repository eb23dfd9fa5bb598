// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF <-> PPTX (PresentationML). Slides carry a title shape and one body
// text box; that is all the converters read or write.

use seitenwerk_core::error::Result;
use tracing::debug;

use super::fonts::FontFamily;
use super::ooxml::{
    self, DOC_RELS_NS, OFFICE_DOC_REL, OoxmlResult, Package, PackageWriter, XmlPart, attr, child, is,
    resolve_target,
};
use super::{NO_TEXT_PLACEHOLDER, ocr_lines};
use crate::ops::OpContext;
use crate::pdf::Document;
use crate::pdf::writer::{LayoutWriter, StyledLine};

const P_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const PRESENTATION_PART: &str = "ppt/presentation.xml";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// 10 x 7.5 inches in EMU.
const SLIDE_CX: i64 = 9_144_000;
const SLIDE_CY: i64 = 6_858_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SlideLine {
    pub text: String,
    /// Points.
    pub size: Option<f32>,
    pub bold: bool,
}

impl SlideLine {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            size: None,
            bold: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub title: String,
    pub lines: Vec<SlideLine>,
}

// -- Writing ------------------------------------------------------------------

fn rel(kind: &str) -> String {
    format!("{REL_BASE}/{kind}")
}

fn shape_frame(xml: &mut XmlPart, x: i64, y: i64, cx: i64, cy: i64) -> OoxmlResult<()> {
    let (x, y, cx, cy) = (x.to_string(), y.to_string(), cx.to_string(), cy.to_string());
    xml.open("p:spPr", &[])?.open("a:xfrm", &[])?;
    xml.empty("a:off", &[("x", &x), ("y", &y)])?;
    xml.empty("a:ext", &[("cx", &cx), ("cy", &cy)])?;
    xml.close("a:xfrm")?;
    xml.open("a:prstGeom", &[("prst", "rect")])?.empty("a:avLst", &[])?.close("a:prstGeom")?;
    xml.close("p:spPr")?;
    Ok(())
}

fn text_shape(xml: &mut XmlPart, id: u32, name: &str, frame: (i64, i64, i64, i64), lines: &[SlideLine]) -> OoxmlResult<()> {
    let id = id.to_string();
    xml.open("p:sp", &[])?.open("p:nvSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", &id), ("name", name)])?;
    xml.open("p:cNvSpPr", &[("txBox", "1")])?.close("p:cNvSpPr")?;
    xml.empty("p:nvPr", &[])?;
    xml.close("p:nvSpPr")?;
    shape_frame(xml, frame.0, frame.1, frame.2, frame.3)?;
    xml.open("p:txBody", &[])?;
    xml.open("a:bodyPr", &[("wrap", "square")])?.empty("a:normAutofit", &[])?.close("a:bodyPr")?;
    xml.empty("a:lstStyle", &[])?;
    for line in lines {
        xml.open("a:p", &[])?.open("a:r", &[])?;
        let size = line.size.map(|size| ((size * 100.0).round() as i64).to_string());
        let mut props: Vec<(&str, &str)> = vec![("lang", "en-US")];
        if let Some(size) = &size {
            props.push(("sz", size.as_str()));
        }
        if line.bold {
            props.push(("b", "1"));
        }
        xml.empty("a:rPr", &props)?;
        xml.leaf("a:t", &[], &line.text)?;
        xml.close("a:r")?.close("a:p")?;
    }
    xml.close("p:txBody")?.close("p:sp")?;
    Ok(())
}

fn slide_part(slide: &Slide) -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open("p:sld", &[("xmlns:a", A_NS), ("xmlns:r", DOC_RELS_NS), ("xmlns:p", P_NS)])?;
    xml.open("p:cSld", &[])?.open("p:spTree", &[])?;
    xml.open("p:nvGrpSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "1"), ("name", "")])?;
    xml.empty("p:cNvGrpSpPr", &[])?.empty("p:nvPr", &[])?;
    xml.close("p:nvGrpSpPr")?;
    xml.empty("p:grpSpPr", &[])?;

    let title = SlideLine {
        text: slide.title.clone(),
        size: Some(28.0),
        bold: true,
    };
    text_shape(&mut xml, 2, "Title", (457_200, 274_638, 8_229_600, 1_143_000), &[title])?;
    text_shape(&mut xml, 3, "Content", (457_200, 1_600_200, 8_229_600, 4_525_963), &slide.lines)?;

    xml.close("p:spTree")?.close("p:cSld")?;
    xml.open("p:clrMapOvr", &[])?.empty("a:masterClrMapping", &[])?.close("p:clrMapOvr")?;
    xml.close("p:sld")?;
    Ok(xml.finish())
}

fn empty_tree(xml: &mut XmlPart) -> OoxmlResult<()> {
    xml.open("p:cSld", &[])?.open("p:spTree", &[])?;
    xml.open("p:nvGrpSpPr", &[])?;
    xml.empty("p:cNvPr", &[("id", "1"), ("name", "")])?;
    xml.empty("p:cNvGrpSpPr", &[])?.empty("p:nvPr", &[])?;
    xml.close("p:nvGrpSpPr")?;
    xml.empty("p:grpSpPr", &[])?;
    xml.close("p:spTree")?.close("p:cSld")?;
    Ok(())
}

fn master_part() -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open("p:sldMaster", &[("xmlns:a", A_NS), ("xmlns:r", DOC_RELS_NS), ("xmlns:p", P_NS)])?;
    empty_tree(&mut xml)?;
    xml.empty(
        "p:clrMap",
        &[
            ("bg1", "lt1"),
            ("tx1", "dk1"),
            ("bg2", "lt2"),
            ("tx2", "dk2"),
            ("accent1", "accent1"),
            ("accent2", "accent2"),
            ("accent3", "accent3"),
            ("accent4", "accent4"),
            ("accent5", "accent5"),
            ("accent6", "accent6"),
            ("hlink", "hlink"),
            ("folHlink", "folHlink"),
        ],
    )?;
    xml.open("p:sldLayoutIdLst", &[])?;
    xml.empty("p:sldLayoutId", &[("id", "2147483649"), ("r:id", "rId1")])?;
    xml.close("p:sldLayoutIdLst")?;
    xml.close("p:sldMaster")?;
    Ok(xml.finish())
}

fn layout_part() -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open(
        "p:sldLayout",
        &[("xmlns:a", A_NS), ("xmlns:r", DOC_RELS_NS), ("xmlns:p", P_NS), ("type", "blank")],
    )?;
    empty_tree(&mut xml)?;
    xml.open("p:clrMapOvr", &[])?.empty("a:masterClrMapping", &[])?.close("p:clrMapOvr")?;
    xml.close("p:sldLayout")?;
    Ok(xml.finish())
}

fn theme_part() -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open("a:theme", &[("xmlns:a", A_NS), ("name", "Seitenwerk")])?;
    xml.open("a:themeElements", &[])?;

    xml.open("a:clrScheme", &[("name", "Seitenwerk")])?;
    for (slot, rgb) in [
        ("dk1", "000000"),
        ("lt1", "FFFFFF"),
        ("dk2", "1F497D"),
        ("lt2", "EEECE1"),
        ("accent1", "4F81BD"),
        ("accent2", "C0504D"),
        ("accent3", "9BBB59"),
        ("accent4", "8064A2"),
        ("accent5", "4BACC6"),
        ("accent6", "F79646"),
        ("hlink", "0000FF"),
        ("folHlink", "800080"),
    ] {
        let tag = format!("a:{slot}");
        xml.open(&tag, &[])?.empty("a:srgbClr", &[("val", rgb)])?.close(&tag)?;
    }
    xml.close("a:clrScheme")?;

    xml.open("a:fontScheme", &[("name", "Seitenwerk")])?;
    for group in ["a:majorFont", "a:minorFont"] {
        xml.open(group, &[])?;
        xml.empty("a:latin", &[("typeface", "Arial")])?;
        xml.empty("a:ea", &[("typeface", "")])?;
        xml.empty("a:cs", &[("typeface", "")])?;
        xml.close(group)?;
    }
    xml.close("a:fontScheme")?;

    xml.open("a:fmtScheme", &[("name", "Seitenwerk")])?;
    for list in ["a:fillStyleLst", "a:bgFillStyleLst"] {
        xml.open(list, &[])?;
        for _ in 0..3 {
            xml.open("a:solidFill", &[])?.empty("a:schemeClr", &[("val", "phClr")])?.close("a:solidFill")?;
        }
        xml.close(list)?;
    }
    xml.open("a:lnStyleLst", &[])?;
    for width in ["9525", "25400", "38100"] {
        xml.open("a:ln", &[("w", width)])?;
        xml.open("a:solidFill", &[])?.empty("a:schemeClr", &[("val", "phClr")])?.close("a:solidFill")?;
        xml.close("a:ln")?;
    }
    xml.close("a:lnStyleLst")?;
    xml.open("a:effectStyleLst", &[])?;
    for _ in 0..3 {
        xml.open("a:effectStyle", &[])?.empty("a:effectLst", &[])?.close("a:effectStyle")?;
    }
    xml.close("a:effectStyleLst")?;
    xml.close("a:fmtScheme")?;

    xml.close("a:themeElements")?;
    xml.close("a:theme")?;
    Ok(xml.finish())
}

fn presentation_part(slides: usize) -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open("p:presentation", &[("xmlns:a", A_NS), ("xmlns:r", DOC_RELS_NS), ("xmlns:p", P_NS)])?;
    xml.open("p:sldMasterIdLst", &[])?;
    xml.empty("p:sldMasterId", &[("id", "2147483648"), ("r:id", "rId1")])?;
    xml.close("p:sldMasterIdLst")?;
    xml.open("p:sldIdLst", &[])?;
    for index in 0..slides {
        let id = (256 + index).to_string();
        let rel_id = format!("rId{}", index + 3);
        xml.empty("p:sldId", &[("id", &id), ("r:id", &rel_id)])?;
    }
    xml.close("p:sldIdLst")?;
    let (cx, cy) = (SLIDE_CX.to_string(), SLIDE_CY.to_string());
    xml.empty("p:sldSz", &[("cx", &cx), ("cy", &cy), ("type", "screen4x3")])?;
    xml.empty("p:notesSz", &[("cx", &cy), ("cy", &cx)])?;
    xml.close("p:presentation")?;
    Ok(xml.finish())
}

/// Serialize slides into a PPTX package with one master, layout and theme.
pub fn write_pptx(slides: &[Slide]) -> OoxmlResult<Vec<u8>> {
    let mut package = PackageWriter::new();
    let mut overrides = vec![
        (format!("/{PRESENTATION_PART}"), "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"),
        ("/ppt/slideMasters/slideMaster1.xml".to_string(), "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"),
        ("/ppt/slideLayouts/slideLayout1.xml".to_string(), "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"),
        ("/ppt/theme/theme1.xml".to_string(), "application/vnd.openxmlformats-officedocument.theme+xml"),
    ];
    let slide_type = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

    let mut presentation_rels = vec![
        ("rId1".to_string(), rel("slideMaster"), "slideMasters/slideMaster1.xml".to_string()),
        ("rId2".to_string(), rel("theme"), "theme/theme1.xml".to_string()),
    ];
    let layout_rel = rel("slideLayout");
    for (index, slide) in slides.iter().enumerate() {
        let number = index + 1;
        overrides.push((format!("/ppt/slides/slide{number}.xml"), slide_type));
        presentation_rels.push((format!("rId{}", index + 3), rel("slide"), format!("slides/slide{number}.xml")));
        package.add(format!("ppt/slides/slide{number}.xml"), slide_part(slide)?);
        package.add(
            format!("ppt/slides/_rels/slide{number}.xml.rels"),
            ooxml::relationships(&[(
                "rId1".to_string(),
                layout_rel.as_str(),
                "../slideLayouts/slideLayout1.xml".to_string(),
            )])?,
        );
    }

    package.add("[Content_Types].xml", ooxml::content_types(&overrides)?);
    package.add(
        "_rels/.rels",
        ooxml::relationships(&[("rId1".to_string(), OFFICE_DOC_REL, PRESENTATION_PART.to_string())])?,
    );
    let presentation_rels: Vec<(String, &str, String)> = presentation_rels
        .iter()
        .map(|(id, kind, target)| (id.clone(), kind.as_str(), target.clone()))
        .collect();
    package.add("ppt/_rels/presentation.xml.rels", ooxml::relationships(&presentation_rels)?);
    package.add(PRESENTATION_PART, presentation_part(slides.len())?);
    package.add("ppt/slideMasters/slideMaster1.xml", master_part()?);
    package.add(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        ooxml::relationships(&[
            ("rId1".to_string(), layout_rel.as_str(), "../slideLayouts/slideLayout1.xml".to_string()),
            ("rId2".to_string(), rel("theme").as_str(), "../theme/theme1.xml".to_string()),
        ])?,
    );
    package.add("ppt/slideLayouts/slideLayout1.xml", layout_part()?);
    package.add(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        ooxml::relationships(&[(
            "rId1".to_string(),
            rel("slideMaster").as_str(),
            "../slideMasters/slideMaster1.xml".to_string(),
        )])?,
    );
    package.add("ppt/theme/theme1.xml", theme_part()?);
    package.finish()
}

// -- Reading ------------------------------------------------------------------

/// Slide part names in presentation order. Falls back to numeric part-name
/// order when the presentation part lists none.
fn slide_parts(package: &Package) -> OoxmlResult<Vec<String>> {
    if package.has(PRESENTATION_PART) {
        let rels = package.rels("ppt/_rels/presentation.xml.rels")?;
        let xml = package.text(PRESENTATION_PART)?;
        let doc = ooxml::parse(PRESENTATION_PART, xml)?;
        let ordered: Vec<String> = doc
            .descendants()
            .filter(|n| is(n, "sldId"))
            .filter_map(|n| n.attribute((DOC_RELS_NS, "id")))
            .filter_map(|rel_id| rels.get(rel_id))
            .map(|target| resolve_target(PRESENTATION_PART, target))
            .filter(|part| package.has(part))
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }
    }
    let mut numbered: Vec<(u32, String)> = package
        .names()
        .filter_map(|name| {
            let number = name.strip_prefix("ppt/slides/slide")?.strip_suffix(".xml")?.parse().ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    numbered.sort();
    Ok(numbered.into_iter().map(|(_, name)| name).collect())
}

/// Every paragraph of a slide as a line; the first non-empty one is the title.
fn read_slide(part: &str, xml: &str) -> OoxmlResult<Vec<SlideLine>> {
    let doc = ooxml::parse(part, xml)?;
    Ok(doc
        .descendants()
        .filter(|n| is(n, "p") && n.tag_name().namespace() == Some(A_NS))
        .map(|paragraph| {
            let first_props = paragraph
                .descendants()
                .filter(|n| is(n, "r"))
                .find_map(|run| child(&run, "rPr"));
            SlideLine {
                text: ooxml::text_of(&paragraph, "t"),
                size: first_props
                    .and_then(|props| attr(&props, "sz"))
                    .and_then(|sz| sz.parse::<f32>().ok())
                    .map(|hundredths| hundredths / 100.0),
                bold: first_props
                    .and_then(|props| attr(&props, "b"))
                    .is_some_and(|b| b == "1" || b == "true"),
            }
        })
        .filter(|line| !line.text.trim().is_empty())
        .collect())
}

/// Slides in order, with their text lines.
pub fn read_pptx(package: &Package) -> OoxmlResult<Vec<Vec<SlideLine>>> {
    slide_parts(package)?
        .iter()
        .map(|part| read_slide(part, package.text(part)?))
        .collect()
}

// -- PDF -> PPTX --------------------------------------------------------------

fn page_slides(ctx: &OpContext<'_>, document: &Document, styled: bool) -> Result<Vec<Slide>> {
    let ocr = ocr_lines(ctx, document, ctx.config.slide_ocr_min_chars);
    let mut slides = Vec::with_capacity(document.page_count());
    for page in document.pages() {
        let lines: Vec<SlideLine> = match ocr.get(&page.number) {
            Some(lines) if !lines.is_empty() => lines.iter().map(SlideLine::plain).collect(),
            _ if styled => document
                .page_lines(page)?
                .iter()
                .map(|line| SlideLine {
                    text: line.text().trim().to_string(),
                    size: Some(line.average_size().round().clamp(8.0, 40.0)),
                    bold: line.any_bold(),
                })
                .filter(|line| !line.text.is_empty())
                .collect(),
            _ => page
                .text()
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(SlideLine::plain)
                .collect(),
        };
        let lines = if lines.is_empty() {
            vec![SlideLine::plain(NO_TEXT_PLACEHOLDER)]
        } else {
            lines
        };
        slides.push(Slide {
            title: format!("Page {}", page.number),
            lines,
        });
    }
    Ok(slides)
}

pub fn pdf_to_pptx_rich(ctx: &OpContext<'_>, document: &Document) -> Result<Vec<u8>> {
    Ok(write_pptx(&page_slides(ctx, document, true)?)?)
}

pub fn pdf_to_pptx_simple(ctx: &OpContext<'_>, document: &Document) -> Result<Vec<u8>> {
    Ok(write_pptx(&page_slides(ctx, document, false)?)?)
}

// -- PPTX -> PDF --------------------------------------------------------------

fn slides_to_pdf(package: &Package, styled: bool) -> Result<Vec<u8>> {
    let slides = read_pptx(package)?;
    let mut writer = LayoutWriter::landscape("Converted presentation");
    for (index, lines) in slides.iter().enumerate() {
        writer.page_break();
        writer.push(StyledLine::new(format!("Slide {}", index + 1), FontFamily::Sans, 20.0).bold());
        for line in lines {
            let mut styled_line = if styled {
                StyledLine::new(line.text.trim(), FontFamily::Sans, line.size.unwrap_or(12.0).clamp(8.0, 32.0))
            } else {
                StyledLine::new(line.text.trim(), FontFamily::Sans, 12.0)
            };
            if styled && line.bold {
                styled_line = styled_line.bold();
            }
            writer.push(styled_line.spaced(6.0));
        }
    }
    debug!(slides = slides.len(), "Presentation laid out");
    writer.finish()
}

pub fn pptx_to_pdf_rich(package: &Package) -> Result<Vec<u8>> {
    slides_to_pdf(package, true)
}

pub fn pptx_to_pdf_simple(package: &Package) -> Result<Vec<u8>> {
    slides_to_pdf(package, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};
    use crate::ocr::NoOcr;
    use crate::ocr::testing::ScriptedOcr;
    use crate::ops::testing::default_backends;
    use seitenwerk_core::PipelineConfig;

    fn slide_texts(bytes: &[u8]) -> Vec<Vec<String>> {
        let package = Package::from_bytes(bytes).unwrap();
        read_pptx(&package)
            .unwrap()
            .into_iter()
            .map(|lines| lines.into_iter().map(|line| line.text).collect())
            .collect()
    }

    #[test]
    fn package_has_presentation_parts_in_order() {
        let slides: Vec<Slide> = (1..=11)
            .map(|n| Slide {
                title: format!("Page {n}"),
                lines: vec![SlideLine::plain(format!("body {n}"))],
            })
            .collect();
        let package = Package::from_bytes(&write_pptx(&slides).unwrap()).unwrap();
        for part in [
            PRESENTATION_PART,
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/slides/slide11.xml",
        ] {
            assert!(package.has(part), "{part}");
        }
        let read = read_pptx(&package).unwrap();
        assert_eq!(read.len(), 11);
        assert_eq!(read[9][0].text, "Page 10");
        assert_eq!(read[9][1].text, "body 10");
    }

    #[test]
    fn text_pages_become_titled_slides() {
        let document = Document::from_bytes(&fixtures::text_pdf(&[&fixtures::prose(80, 'a'), &fixtures::prose(80, 'b')])).unwrap();
        let config = PipelineConfig::default();
        let (renderers, workspace) = default_backends();
        let ctx = OpContext::new(&config, &renderers, &NoOcr, &workspace);

        let bytes = pdf_to_pptx_rich(&ctx, &document).unwrap();
        let package = Package::from_bytes(&bytes).unwrap();
        let slides = read_pptx(&package).unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0][0].text, "Page 1");
        assert!(slides[0][0].bold);
        assert_eq!(slides[0][1].size, Some(12.0));
        assert!(slides[1][1].text.starts_with("borem"));
    }

    #[test]
    fn sparse_pages_are_recognised_or_get_a_placeholder() {
        let document = Document::from_bytes(&fixtures::pdf(&[PageSpec::image(30, 30, 1), PageSpec::blank()])).unwrap();
        let config = PipelineConfig::default();
        let (renderers, workspace) = default_backends();

        let ocr = ScriptedOcr::returning(&[("scanned words", 0.35), ("ignored", 0.2)]);
        let ctx = OpContext::new(&config, &renderers, &ocr, &workspace);
        let texts = slide_texts(&pdf_to_pptx_rich(&ctx, &document).unwrap());
        assert_eq!(texts[0], vec!["Page 1", "scanned words"]);
        assert_eq!(texts[1], vec!["Page 2", "scanned words"]);

        let ctx = OpContext::new(&config, &renderers, &NoOcr, &workspace);
        let texts = slide_texts(&pdf_to_pptx_simple(&ctx, &document).unwrap());
        assert_eq!(texts[0], vec!["Page 1", NO_TEXT_PLACEHOLDER]);
    }

    #[test]
    fn slides_lay_out_as_landscape_pages() {
        let slides = vec![
            Slide {
                title: "Intro".into(),
                lines: vec![SlideLine {
                    text: "first point".into(),
                    size: Some(18.0),
                    bold: true,
                }],
            },
            Slide {
                title: "Next".into(),
                lines: vec![SlideLine::plain("second point")],
            },
        ];
        let package = Package::from_bytes(&write_pptx(&slides).unwrap()).unwrap();
        for bytes in [pptx_to_pdf_rich(&package).unwrap(), pptx_to_pdf_simple(&package).unwrap()] {
            let document = Document::from_bytes(&bytes).unwrap();
            assert_eq!(document.page_count(), 2);
            assert!(document.pages()[0].width > document.pages()[0].height);
            assert!(document.pages()[0].text().contains("Slide 1"));
            assert!(document.pages()[1].text().contains("second point"));
        }
    }
}
