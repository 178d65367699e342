use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use virtual_grid::model::{GridFrame, RenderSurface};

/// Text surface: prints each frame as a table to stdout
pub struct TableSurface {
    max_width: Option<u16>,
    frames_rendered: usize,
}

impl TableSurface {
    pub fn new(max_width: Option<u16>) -> Self {
        Self {
            max_width,
            frames_rendered: 0,
        }
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered
    }
}

impl RenderSurface for TableSurface {
    fn render(&mut self, frame: &GridFrame<'_>) {
        println!("{}", build_table(frame, self.max_width));

        let viewport = &frame.viewport;
        println!(
            "rows {}..={}  cols {}..={}  window {:.0}x{:.0}px  content {:.0}x{:.0}px",
            viewport.top,
            viewport.bottom,
            viewport.left,
            viewport.right,
            viewport.pixel_width,
            viewport.pixel_height,
            viewport.content_pixel_width,
            viewport.content_pixel_height
        );
        self.frames_rendered += 1;
    }
}

pub fn build_table(frame: &GridFrame<'_>, max_width: Option<u16>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    if let Some(width) = max_width {
        table.set_width(width);
    }

    let mut header = vec![Cell::new("#")];
    header.extend(frame.columns.iter().map(|column| Cell::new(&column.label)));
    table.set_header(header);

    for row in frame.rows {
        let mut cells = vec![Cell::new(&row.label)];
        cells.extend(frame.visible_cells(row).iter().map(Cell::new));
        table.add_row(cells);
    }

    table
}
