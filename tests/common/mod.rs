#![allow(dead_code)]

use eagle2kicad_rs::ImportOptions;
use eagle2kicad_rs::kicad_models::*;
use eagle2kicad_rs::schematic::Sheet;

/// A small library: a two pin resistor and a dual gate NAND.
pub const DEMO_LIBRARY: &str = r#"
<library name="demo">
<symbols>
<symbol name="RES">
<wire x1="-2.54" y1="-0.889" x2="2.54" y2="-0.889" width="0.254" layer="94"/>
<wire x1="2.54" y1="-0.889" x2="2.54" y2="0.889" width="0.254" layer="94"/>
<wire x1="2.54" y1="0.889" x2="-2.54" y2="0.889" width="0.254" layer="94"/>
<wire x1="-2.54" y1="0.889" x2="-2.54" y2="-0.889" width="0.254" layer="94"/>
<text x="-3.81" y="1.4986" size="1.778" layer="95">&gt;NAME</text>
<text x="-3.81" y="-3.302" size="1.778" layer="96">&gt;VALUE</text>
<pin name="1" x="-5.08" y="0" visible="off" length="short" direction="pas" swaplevel="1"/>
<pin name="2" x="5.08" y="0" visible="off" length="short" direction="pas" swaplevel="1" rot="R180"/>
</symbol>
<symbol name="NAND">
<wire x1="-5.08" y1="5.08" x2="-5.08" y2="-5.08" width="0.4064" layer="94"/>
<pin name="A" x="-7.62" y="2.54" visible="pad" length="short" direction="in"/>
<pin name="B" x="-7.62" y="-2.54" visible="pad" length="short" direction="in"/>
<pin name="Y" x="7.62" y="0" visible="pad" length="short" direction="out" rot="R180"/>
</symbol>
</symbols>
<devicesets>
<deviceset name="R" prefix="R" uservalue="yes">
<gates>
<gate name="G$1" symbol="RES" x="0" y="0"/>
</gates>
<devices>
<device name="0603" package="R0603">
<connects>
<connect gate="G$1" pin="1" pad="1"/>
<connect gate="G$1" pin="2" pad="2"/>
</connects>
</device>
</devices>
</deviceset>
<deviceset name="7400" prefix="IC">
<gates>
<gate name="A" symbol="NAND" x="0" y="0"/>
<gate name="B" symbol="NAND" x="0" y="-12.7"/>
</gates>
<devices>
<device name="N" package="DIL14">
<connects>
<connect gate="A" pin="A" pad="1"/>
<connect gate="A" pin="B" pad="2"/>
<connect gate="A" pin="Y" pad="3"/>
<connect gate="B" pin="A" pad="4"/>
<connect gate="B" pin="B" pad="5"/>
<connect gate="B" pin="Y" pad="6"/>
</connects>
</device>
</devices>
</deviceset>
</devicesets>
</library>
"#;

const LAYERS: &str = r#"
<layers>
<layer number="91" name="Nets" color="2" fill="1" visible="yes" active="yes"/>
<layer number="92" name="Busses" color="1" fill="1" visible="yes" active="yes"/>
<layer number="94" name="Symbols" color="4" fill="1" visible="yes" active="yes"/>
<layer number="95" name="Names" color="7" fill="1" visible="yes" active="yes"/>
<layer number="96" name="Values" color="7" fill="1" visible="yes" active="yes"/>
</layers>
"#;

/// Wraps `body` (the children of `<schematic>`) into a full Eagle file.
pub fn eagle_schematic(version: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE eagle SYSTEM "eagle.dtd">
<eagle version="{version}">
<drawing>
{LAYERS}
<schematic xreflabel="%F%N/%S.%C%R" xrefpart="/%S.%C%R">
{body}
</schematic>
</drawing>
</eagle>
"#
    )
}

/// A standalone `.lbr` file holding [`DEMO_LIBRARY`].
pub fn eagle_library_file() -> String {
    let library = DEMO_LIBRARY.replacen(r#"<library name="demo">"#, "<library>", 1);
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE eagle SYSTEM "eagle.dtd">
<eagle version="9.6.2">
<drawing>
{LAYERS}
{library}
</drawing>
</eagle>
"#
    )
}

/// A schematic using [`DEMO_LIBRARY`] with the given parts and sheets.
pub fn demo_schematic(parts: &str, sheets: &str) -> String {
    eagle_schematic(
        "9.6.2",
        &format!(
            "<libraries>{}</libraries>\n<parts>{}</parts>\n<sheets>{}</sheets>",
            DEMO_LIBRARY, parts, sheets
        ),
    )
}

/// Options that keep Eagle coordinates as imported.
pub fn exact_options() -> ImportOptions {
    ImportOptions {
        fit_to_page: false,
        ..ImportOptions::default()
    }
}

pub fn components(sheet: &Sheet) -> Vec<&SchComponent> {
    sheet
        .items()
        .iter()
        .filter_map(|item| match &item.kind {
            SchItemKind::Component(c) => Some(c),
            _ => None,
        })
        .collect()
}

pub fn labels(sheet: &Sheet) -> Vec<(&SchLabel, &SchItem)> {
    sheet
        .items()
        .iter()
        .filter_map(|item| match &item.kind {
            SchItemKind::Label(l) => Some((l, item)),
            _ => None,
        })
        .collect()
}

pub fn lines(sheet: &Sheet, kind: LineKind) -> Vec<&SchLine> {
    sheet.lines(kind).map(|(_, line)| line).collect()
}
