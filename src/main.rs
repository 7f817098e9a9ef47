//! The vitrine template application: a 300×200 borderless panel with
//! web-loaded fonts, a dark theme, and manual title-band dragging.

use std::process::ExitCode;

use imgui::{Condition, FontConfig, FontGlyphRanges, MouseButton, StyleColor, WindowFlags};
use tracing::{error, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use vitrine::window::{PaintContext, StyleContext};
use vitrine::{interaction, OverlayError, OverlayWindow};

const OPEN_SANS_URL: &str = "http://fonts.gstatic.com/s/opensans/v13/IgZJs4-7SA1XX_edsoXWog.ttf";
const FA6_SOLID_URL: &str =
    "https://raw.githubusercontent.com/FortAwesome/Font-Awesome/6.x/webfonts/fa-solid-900.ttf";

const BASE_FONT_SIZE: f32 = 17.0;
const ICON_FONT_SIZE: f32 = BASE_FONT_SIZE * 2.0 / 3.0;
// Font Awesome solid glyph codepoints, zero-terminated.
const ICON_GLYPH_RANGE: [u32; 3] = [0xe005, 0xf8ff, 0];

const fn rgba(r: u8, g: u8, b: u8, a: u8) -> [f32; 4] {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0]
}

fn setup_tracing() {
    tracing_subscriber::registry()
        .with(
            fmt::layer().event_format(
                fmt::format()
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
        )
        .with(EnvFilter::from_default_env())
        .init();
}

/// Configure the theme and preload the text and icon fonts.
fn style(cx: &mut StyleContext) {
    cx.imgui.set_ini_filename(None);
    cx.imgui.set_log_filename(None);

    let icons_config = FontConfig {
        merge_mode: true,
        pixel_snap_h: true,
        glyph_min_advance_x: ICON_FONT_SIZE,
        glyph_ranges: FontGlyphRanges::from_slice(&ICON_GLYPH_RANGE),
        ..Default::default()
    };

    let fonts = [
        cx.resources
            .load_font_from_web(cx.imgui.fonts(), "open_sans", OPEN_SANS_URL, BASE_FONT_SIZE, None)
            .err(),
        cx.resources
            .load_font_from_web(
                cx.imgui.fonts(),
                "fa6_solid",
                FA6_SOLID_URL,
                ICON_FONT_SIZE,
                Some(icons_config),
            )
            .err(),
    ];
    for err in fonts.into_iter().flatten() {
        warn!("font not loaded: {err}");
    }

    let style = cx.imgui.style_mut();
    style[StyleColor::Border] = rgba(22, 22, 22, 225);
    style[StyleColor::WindowBg] = rgba(13, 13, 13, 225);
    style.window_padding = [0.0, 0.0];
    style.window_border_size = 0.5;
}

/// Draw the main panel and track the manual title-band drag.
fn paint(cx: &mut PaintContext) -> bool {
    let flags = WindowFlags::NO_MOVE
        | WindowFlags::NO_RESIZE
        | WindowFlags::NO_COLLAPSE
        | WindowFlags::NO_TITLE_BAR;

    let ui = cx.ui;
    let hwnd = cx.hwnd;
    let size = cx.size;
    let drag = &mut cx.interaction.drag;

    ui.window("###main_panel")
        .position([0.0, 0.0], Condition::Once)
        .size(size, Condition::Once)
        .flags(flags)
        .opened(&mut cx.interaction.open)
        .build(|| {
            let draw = ui.get_window_draw_list();

            if ui.is_mouse_clicked(MouseButton::Left) {
                if let (Some(cursor), Some(origin)) =
                    (interaction::cursor_pos(), interaction::window_origin(hwnd))
                {
                    let grab_height =
                        ui.text_line_height() + ui.clone_style().frame_padding[1] * 4.0;
                    drag.begin(cursor, origin, grab_height);
                }
            }

            if drag.active() && ui.is_mouse_dragging(MouseButton::Left) {
                if let Some(target) = interaction::cursor_pos().and_then(|c| drag.target(c)) {
                    interaction::move_window(hwnd, target, (size[0] as i32, size[1] as i32));
                }
            }

            draw.add_text([15.0, 15.0], ui.style_color(StyleColor::Text), "Desktop Application");
        });

    cx.interaction.open
}

fn run() -> Result<(), OverlayError> {
    let mut overlay = OverlayWindow::new((300, 200))?;

    if !overlay.run(style, paint)? {
        overlay.detach();
    }

    Ok(())
}

fn main() -> ExitCode {
    setup_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal: {err}");
            ExitCode::FAILURE
        },
    }
}
