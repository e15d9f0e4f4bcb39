// src/schematic.rs

use crate::kicad_models::*;
use glam::IVec2;
use serde::Serialize;

/// Axis aligned box in native units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn at(p: Point) -> Self {
        BoundingBox { min: p, max: p }
    }

    pub fn extend(&mut self, p: Point) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn size(&self) -> IVec2 {
        self.max - self.min
    }
}

/// ISO page sizes, landscape, in mils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    A2,
    A1,
    A0,
}

impl PageSize {
    const ASCENDING: [PageSize; 5] = [
        PageSize::A4,
        PageSize::A3,
        PageSize::A2,
        PageSize::A1,
        PageSize::A0,
    ];

    pub fn dimensions(self) -> IVec2 {
        match self {
            PageSize::A4 => IVec2::new(11693, 8268),
            PageSize::A3 => IVec2::new(16535, 11693),
            PageSize::A2 => IVec2::new(23386, 16535),
            PageSize::A1 => IVec2::new(33110, 23386),
            PageSize::A0 => IVec2::new(46811, 33110),
        }
    }

    /// Smallest page holding `content` with `margin` on every side; A0 if
    /// nothing fits.
    pub fn fitting(content: IVec2, margin: i32) -> PageSize {
        let needed = content + IVec2::splat(2 * margin);
        Self::ASCENDING
            .into_iter()
            .find(|page| {
                let dims = page.dimensions();
                needed.x <= dims.x && needed.y <= dims.y
            })
            .unwrap_or(PageSize::A0)
    }
}

/// Non-owning reference to an item: its index in the sheet's item list at
/// a given generation. Any structural edit makes older refs stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ItemRef {
    pub index: usize,
    pub generation: u64,
}

/// One page of the document, owning its items.
#[derive(Debug, Clone, Serialize)]
pub struct Sheet {
    pub id: SheetId,
    pub name: String,
    pub file_name: String,
    pub parent: Option<SheetId>,
    pub children: Vec<SheetId>,
    pub page: PageSize,
    items: Vec<SchItem>,
    generation: u64,
    next_item_id: u64,
    bounding_box: Option<BoundingBox>,
}

impl Sheet {
    fn new(id: SheetId, name: &str, file_name: &str, parent: Option<SheetId>) -> Self {
        Sheet {
            id,
            name: name.to_string(),
            file_name: file_name.to_string(),
            parent,
            children: Vec::new(),
            page: PageSize::default(),
            items: Vec::new(),
            generation: 0,
            next_item_id: 1,
            bounding_box: None,
        }
    }

    pub fn items(&self) -> &[SchItem] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&SchItem> {
        self.items.iter().find(|item| item.id == id)
    }

    fn index_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Bumped on every add, move and removal.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }

    pub fn item_ref(&self, index: usize) -> ItemRef {
        ItemRef {
            index,
            generation: self.generation,
        }
    }

    /// Resolves `item_ref`, or `None` if the sheet changed since it was taken.
    pub fn resolve(&self, item_ref: ItemRef) -> Option<&SchItem> {
        if item_ref.generation != self.generation {
            return None;
        }
        self.items.get(item_ref.index)
    }

    /// Mutable access for connectivity state only; geometry edits go
    /// through the methods that bump the generation.
    pub(crate) fn resolve_mut(&mut self, item_ref: ItemRef) -> Option<&mut SchItem> {
        if item_ref.generation != self.generation {
            return None;
        }
        self.items.get_mut(item_ref.index)
    }

    pub fn add_item(&mut self, kind: SchItemKind) -> ItemId {
        let id = ItemId(self.next_item_id);
        self.next_item_id += 1;
        for p in kind.extent_points() {
            self.extend_bounds(p);
        }
        self.items.push(SchItem::new(id, kind));
        self.generation += 1;
        id
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<SchItemKind> {
        let index = self.index_of(id)?;
        let item = self.items.remove(index);
        self.generation += 1;
        self.recompute_bounds();
        Some(item.kind)
    }

    pub fn move_item(&mut self, id: ItemId, delta: IVec2) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.items[index].kind.translate(delta);
        self.generation += 1;
        self.recompute_bounds();
        true
    }

    /// Moves every item by `delta`.
    pub fn translate_all(&mut self, delta: IVec2) {
        for item in &mut self.items {
            item.kind.translate(delta);
        }
        self.generation += 1;
        self.recompute_bounds();
    }

    /// Moves one end of a line. `start` selects which.
    pub fn set_line_end(&mut self, id: ItemId, start: bool, to: Point) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let SchItemKind::Line(line) = &mut self.items[index].kind else {
            return false;
        };
        if start {
            line.start = to;
        } else {
            line.end = to;
        }
        self.generation += 1;
        self.extend_bounds(to);
        true
    }

    /// Splits a line at `at`, keeping `id` as the first half and returning
    /// the second half. Nothing happens when `at` is one of the ends.
    pub fn split_line(&mut self, id: ItemId, at: Point) -> Option<ItemId> {
        let index = self.index_of(id)?;
        let SchItemKind::Line(line) = &mut self.items[index].kind else {
            return None;
        };
        if at == line.start || at == line.end {
            return None;
        }
        let second = SchLine {
            kind: line.kind,
            start: at,
            end: line.end,
        };
        line.end = at;
        let states = &mut self.items[index].end_states;
        states.iter_mut().for_each(|s| *s = EndpointState::Dangling);
        Some(self.add_item(SchItemKind::Line(second)))
    }

    pub fn lines(&self, kind: LineKind) -> impl Iterator<Item = (ItemId, &SchLine)> {
        self.items.iter().filter_map(move |item| match &item.kind {
            SchItemKind::Line(line) if line.kind == kind => Some((item.id, line)),
            _ => None,
        })
    }

    fn extend_bounds(&mut self, p: Point) {
        let mut bbox = self.bounding_box.unwrap_or(BoundingBox::at(p));
        bbox.extend(p);
        self.bounding_box = Some(bbox);
    }

    fn recompute_bounds(&mut self) {
        self.bounding_box = None;
        let points: Vec<Point> = self
            .items
            .iter()
            .flat_map(|item| item.kind.extent_points())
            .collect();
        for p in points {
            self.extend_bounds(p);
        }
    }

    /// Picks the page size for the current content and moves the content
    /// onto it, keeping everything on the 100 mil grid.
    pub fn fit_to_page(&mut self, margin: i32) {
        let Some(bbox) = self.bounding_box else {
            return;
        };
        self.page = PageSize::fitting(bbox.size(), margin);
        let target = IVec2::splat(margin);
        let delta = target - bbox.min;
        let delta = IVec2::new(round_to_grid(delta.x), round_to_grid(delta.y));
        if delta != IVec2::ZERO {
            self.translate_all(delta);
        }
    }
}

fn round_to_grid(v: i32) -> i32 {
    ((f64::from(v) / 100.0).round() as i32) * 100
}

/// The document tree: an arena of sheets with one root.
#[derive(Debug, Clone, Serialize)]
pub struct Schematic {
    sheets: Vec<Sheet>,
    root: SheetId,
}

impl Schematic {
    pub fn new(root_name: &str) -> Self {
        let root = SheetId(0);
        Schematic {
            sheets: vec![Sheet::new(root, root_name, &format!("{}.sch", root_name), None)],
            root,
        }
    }

    pub fn root(&self) -> SheetId {
        self.root
    }

    pub fn root_sheet(&self) -> &Sheet {
        &self.sheets[self.root.0]
    }

    pub fn sheet(&self, id: SheetId) -> Option<&Sheet> {
        self.sheets.get(id.0)
    }

    pub fn sheet_mut(&mut self, id: SheetId) -> Option<&mut Sheet> {
        self.sheets.get_mut(id.0)
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    pub(crate) fn sheets_mut(&mut self) -> impl Iterator<Item = &mut Sheet> {
        self.sheets.iter_mut()
    }

    /// Creates a new sheet attached below `parent`. Returns `None` when
    /// `parent` does not exist.
    pub fn add_child(&mut self, parent: SheetId, name: &str, file_name: &str) -> Option<SheetId> {
        self.sheets.get(parent.0)?;
        let id = SheetId(self.sheets.len());
        self.sheets.push(Sheet::new(id, name, file_name, Some(parent)));
        self.sheets[parent.0].children.push(id);
        Some(id)
    }

    /// Unlinks `child` from its parent and drops the parent's symbol for
    /// it. The sheet stays in the arena without a parent.
    pub fn detach(&mut self, child: SheetId) -> bool {
        let Some(parent) = self.sheets.get(child.0).and_then(|s| s.parent) else {
            return false;
        };
        let parent_sheet = &mut self.sheets[parent.0];
        parent_sheet.children.retain(|c| *c != child);
        let symbols: Vec<ItemId> = parent_sheet
            .items()
            .iter()
            .filter(|item| matches!(&item.kind, SchItemKind::SheetSymbol(s) if s.child == child))
            .map(|item| item.id)
            .collect();
        for id in symbols {
            parent_sheet.remove_item(id);
        }
        self.sheets[child.0].parent = None;
        true
    }

    /// Sheet ids from the root down to `id`.
    pub fn path(&self, id: SheetId) -> Vec<SheetId> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.sheets.get(current.0).and_then(|s| s.parent);
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(sx: i32, sy: i32, ex: i32, ey: i32) -> SchItemKind {
        SchItemKind::Line(SchLine {
            kind: LineKind::Wire,
            start: IVec2::new(sx, sy),
            end: IVec2::new(ex, ey),
        })
    }

    #[test]
    fn stale_refs_do_not_resolve() {
        let mut schematic = Schematic::new("root");
        let sheet = schematic.sheet_mut(SheetId(0)).unwrap();
        sheet.add_item(wire(0, 0, 100, 0));
        let item_ref = sheet.item_ref(0);
        assert!(sheet.resolve(item_ref).is_some());

        sheet.add_item(wire(100, 0, 200, 0));
        assert!(sheet.resolve(item_ref).is_none());
    }

    #[test]
    fn split_line_keeps_both_halves() {
        let mut schematic = Schematic::new("root");
        let sheet = schematic.sheet_mut(SheetId(0)).unwrap();
        let id = sheet.add_item(wire(0, 0, 200, 0));
        let second = sheet.split_line(id, IVec2::new(100, 0)).unwrap();
        assert_eq!(sheet.items().len(), 2);
        let SchItemKind::Line(first) = &sheet.item(id).unwrap().kind else {
            panic!("not a line");
        };
        assert_eq!(first.end, IVec2::new(100, 0));
        let SchItemKind::Line(rest) = &sheet.item(second).unwrap().kind else {
            panic!("not a line");
        };
        assert_eq!(rest.start, IVec2::new(100, 0));
        assert!(sheet.split_line(id, IVec2::new(0, 0)).is_none());
    }

    #[test]
    fn hierarchy_attach_and_detach() {
        let mut schematic = Schematic::new("root");
        let child = schematic.add_child(schematic.root(), "sub", "sub.sch").unwrap();
        assert_eq!(schematic.path(child), vec![SheetId(0), child]);
        assert!(schematic.detach(child));
        assert!(schematic.root_sheet().children.is_empty());
        assert_eq!(schematic.sheet(child).unwrap().parent, None);
    }

    #[test]
    fn page_fitting() {
        assert_eq!(PageSize::fitting(IVec2::new(5000, 4000), 1000), PageSize::A4);
        assert_eq!(PageSize::fitting(IVec2::new(12000, 6000), 1000), PageSize::A3);
        assert_eq!(PageSize::fitting(IVec2::new(90000, 90000), 1000), PageSize::A0);
    }
}
