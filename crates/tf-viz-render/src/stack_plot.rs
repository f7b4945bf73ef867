//! Stacked-distribution plot: main panel with stacked backgrounds and
//! data points, residual pull panel underneath.

use tf_viz::{StackArtifact, StackSeries};

use crate::axes::Axis;
use crate::canvas::Canvas;
use crate::color::{sample_color, Color};
use crate::config::RenderConfig;
use crate::layout::{MainRatioLayout, PlotArea};
use crate::primitives::*;

pub fn render(artifact: &StackArtifact, config: &RenderConfig) -> crate::Result<String> {
    let n_bins = artifact.data_y.len();
    if n_bins == 0 || artifact.edges.len() != n_bins + 1 {
        return Err(crate::RenderError::Layout(format!(
            "artifact '{}' has {} bins and {} edges",
            artifact.name,
            n_bins,
            artifact.edges.len()
        )));
    }

    let mut canvas = Canvas::new(config.width, config.height);

    let x_min = artifact.edges[0];
    let x_max = *artifact.edges.last().unwrap();
    let x_axis = Axis::fixed(x_min, x_max, 20.0);

    // headroom for the annotation block and legend
    let y_max = finite_max(
        artifact
            .stacks
            .iter()
            .chain(artifact.scaled_signals.iter())
            .flat_map(|s| s.y.iter().copied())
            .chain(
                artifact
                    .data_y
                    .iter()
                    .zip(artifact.data_yerr_hi.iter())
                    .map(|(&y, &e)| y + e),
            ),
    )
    .unwrap_or(1.0);
    let y_axis = Axis::auto_linear(0.0, y_max * 1.4, 5).with_label("Events / 7 GeV");

    let res_extent = finite_max(
        artifact
            .residual_y
            .iter()
            .zip(artifact.residual_yerr.iter())
            .map(|(&y, &e)| y.abs() + e)
            .chain(artifact.residual_stacks.iter().flat_map(|s| s.y.iter().map(|v| v.abs()))),
    )
    .unwrap_or(3.0);
    let res_axis =
        Axis::auto_linear(-res_extent * 1.3, res_extent * 1.3, 3).with_label("(Data-Bkg)/\u{03c3}");

    let tick_style = TextStyle { size: config.tick_size, ..Default::default() };
    let left_margin = y_axis
        .tick_labels
        .iter()
        .chain(res_axis.tick_labels.iter())
        .map(|l| canvas.measure_text(l, &tick_style).width)
        .fold(0.0_f64, f64::max)
        + config.label_size
        + 22.0;
    let right_margin = 15.0;
    let top_margin = config.title_size * 1.3 + 16.0;
    let bottom_margin = config.tick_size + config.label_size + 20.0;
    let content_w = config.width - left_margin - right_margin;
    let content_h = config.height - top_margin - bottom_margin;
    let layout = MainRatioLayout::new(left_margin, top_margin, content_w, content_h, 4.0, 0.25);

    draw_header(&mut canvas, &layout.main, artifact, config);

    // --- main panel ---
    let main = &layout.main;
    draw_axes(&mut canvas, main, &x_axis, &y_axis, config, false);
    for series in &artifact.stacks {
        draw_series(&mut canvas, main, &x_axis, &y_axis, &artifact.edges, series);
    }
    for series in &artifact.scaled_signals {
        draw_series(&mut canvas, main, &x_axis, &y_axis, &artifact.edges, series);
    }
    draw_data(
        &mut canvas,
        main,
        &x_axis,
        &y_axis,
        &artifact.edges,
        &artifact.data_y,
        &artifact.data_yerr_lo,
        &artifact.data_yerr_hi,
        &artifact.plot_bins,
    );
    draw_annotation(&mut canvas, main, artifact, config);
    draw_legend(&mut canvas, main, artifact, config);

    // --- residual panel ---
    let ratio = &layout.ratio;
    draw_axes(&mut canvas, ratio, &x_axis, &res_axis, config, true);
    let zero_y = res_axis.data_to_pixel(0.0, ratio.bottom(), ratio.top);
    canvas.line(
        ratio.left,
        zero_y,
        ratio.right(),
        zero_y,
        &LineStyle::dashed(Color::rgb(128, 128, 128), 0.8),
    );
    for series in &artifact.residual_stacks {
        draw_series(&mut canvas, ratio, &x_axis, &res_axis, &artifact.edges, series);
    }
    draw_data(
        &mut canvas,
        ratio,
        &x_axis,
        &res_axis,
        &artifact.edges,
        &artifact.residual_y,
        &artifact.residual_yerr,
        &artifact.residual_yerr,
        &artifact.plot_bins,
    );

    Ok(canvas.finish_svg())
}

fn finite_max(values: impl Iterator<Item = f64>) -> Option<f64> {
    let m = values.filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    if m.is_finite() { Some(m) } else { None }
}

/// Step outline in pixel space, split on non-finite bins.
fn step_segments(
    area: &PlotArea,
    x_axis: &Axis,
    y_axis: &Axis,
    edges: &[f64],
    y: &[f64],
) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for (i, &v) in y.iter().enumerate() {
        if !v.is_finite() {
            if current.len() > 1 {
                segments.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            continue;
        }
        let px_lo = x_axis.data_to_pixel(edges[i], area.left, area.right());
        let px_hi = x_axis.data_to_pixel(edges[i + 1], area.left, area.right());
        let py = y_axis.data_to_pixel(v, area.bottom(), area.top);
        current.push((px_lo, py));
        current.push((px_hi, py));
    }
    if current.len() > 1 {
        segments.push(current);
    }
    segments
}

fn draw_series(
    canvas: &mut Canvas,
    area: &PlotArea,
    x_axis: &Axis,
    y_axis: &Axis,
    edges: &[f64],
    series: &StackSeries,
) {
    let color = sample_color(&series.sample);
    if series.filled {
        let lo = series.y0.clone().unwrap_or_else(|| vec![0.0; series.y.len()]);
        let mut xs = Vec::with_capacity(series.y.len() * 2);
        let mut y_hi = Vec::with_capacity(series.y.len() * 2);
        let mut y_lo = Vec::with_capacity(series.y.len() * 2);
        for i in 0..series.y.len() {
            if !series.y[i].is_finite() || !lo[i].is_finite() {
                continue;
            }
            let px_lo = x_axis.data_to_pixel(edges[i], area.left, area.right());
            let px_hi = x_axis.data_to_pixel(edges[i + 1], area.left, area.right());
            let py_hi = y_axis.data_to_pixel(series.y[i], area.bottom(), area.top);
            let py_lo = y_axis.data_to_pixel(lo[i], area.bottom(), area.top);
            xs.push(px_lo);
            xs.push(px_hi);
            y_hi.push(py_hi);
            y_hi.push(py_hi);
            y_lo.push(py_lo);
            y_lo.push(py_lo);
        }
        canvas.fill_between(&xs, &y_lo, &y_hi, &Style::filled(color.with_alpha(0.8)));
    }
    let style = if series.dashed {
        LineStyle::dashed(color, 1.2)
    } else {
        LineStyle::solid(color, 1.2)
    };
    for segment in step_segments(area, x_axis, y_axis, edges, &series.y) {
        canvas.polyline(&segment, &style);
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_data(
    canvas: &mut Canvas,
    area: &PlotArea,
    x_axis: &Axis,
    y_axis: &Axis,
    edges: &[f64],
    y: &[f64],
    yerr_lo: &[f64],
    yerr_hi: &[f64],
    plot_bins: &[bool],
) {
    let color = Color::rgb(0, 0, 0);
    let err_style = LineStyle::solid(color, 1.0);
    for i in 0..y.len() {
        if !plot_bins.get(i).copied().unwrap_or(true) || !y[i].is_finite() {
            continue;
        }
        let x_center = 0.5 * (edges[i] + edges[i + 1]);
        let px = x_axis.data_to_pixel(x_center, area.left, area.right());
        let py = y_axis.data_to_pixel(y[i], area.bottom(), area.top);
        let py_lo = y_axis.data_to_pixel(y[i] - yerr_lo[i], area.bottom(), area.top);
        let py_hi = y_axis.data_to_pixel(y[i] + yerr_hi[i], area.bottom(), area.top);
        canvas.error_bar(px, py_lo.min(area.bottom()), py_hi.max(area.top), 0.0, &err_style);
        canvas.circle(px, py, 1.8, &Style::filled(color));
    }
}

fn draw_axes(
    canvas: &mut Canvas,
    area: &PlotArea,
    x_axis: &Axis,
    y_axis: &Axis,
    config: &RenderConfig,
    with_x_labels: bool,
) {
    let frame = LineStyle::solid(Color::rgb(0, 0, 0), 0.8);
    let tick = LineStyle::solid(Color::rgb(0, 0, 0), 0.6);
    let tl = 4.0;

    canvas.line(area.left, area.top, area.right(), area.top, &frame);
    canvas.line(area.left, area.bottom(), area.right(), area.bottom(), &frame);
    canvas.line(area.left, area.top, area.left, area.bottom(), &frame);
    canvas.line(area.right(), area.top, area.right(), area.bottom(), &frame);

    let x_label_style = TextStyle {
        size: config.tick_size,
        anchor: TextAnchor::Middle,
        baseline: TextBaseline::Hanging,
        ..Default::default()
    };
    for (i, &val) in x_axis.tick_positions.iter().enumerate() {
        let px = x_axis.data_to_pixel(val, area.left, area.right());
        if px < area.left - 0.5 || px > area.right() + 0.5 {
            continue;
        }
        canvas.line(px, area.bottom(), px, area.bottom() - tl, &tick);
        canvas.line(px, area.top, px, area.top + tl, &tick);
        if with_x_labels {
            if let Some(label) = x_axis.tick_labels.get(i) {
                canvas.text(px, area.bottom() + 3.0, label, &x_label_style);
            }
        }
    }

    let y_label_style = TextStyle {
        size: config.tick_size,
        anchor: TextAnchor::End,
        baseline: TextBaseline::Central,
        ..Default::default()
    };
    for (i, &val) in y_axis.tick_positions.iter().enumerate() {
        let py = y_axis.data_to_pixel(val, area.bottom(), area.top);
        if py < area.top - 0.5 || py > area.bottom() + 0.5 {
            continue;
        }
        canvas.line(area.left, py, area.left + tl, py, &tick);
        canvas.line(area.right(), py, area.right() - tl, py, &tick);
        if let Some(label) = y_axis.tick_labels.get(i) {
            canvas.text(area.left - 4.0, py, label, &y_label_style);
        }
    }

    let label_style =
        TextStyle { size: config.label_size, anchor: TextAnchor::Middle, ..Default::default() };
    if with_x_labels && !x_axis.label.is_empty() {
        canvas.text(
            area.left + area.width / 2.0,
            area.bottom() + config.tick_size + 14.0,
            &x_axis.label,
            &label_style,
        );
    }
    if !y_axis.label.is_empty() {
        canvas.text_rotated(
            area.left - config.label_size - 22.0,
            area.top + area.height / 2.0,
            &y_axis.label,
            &label_style,
            -90.0,
        );
    }
}

fn draw_header(
    canvas: &mut Canvas,
    main: &PlotArea,
    artifact: &StackArtifact,
    config: &RenderConfig,
) {
    let y = main.top - 6.0;
    let bold = TextStyle {
        size: config.title_size,
        weight: FontWeight::Bold,
        ..Default::default()
    };
    canvas.text(main.left, y, &config.experiment, &bold);
    let offset = canvas.measure_text(&config.experiment, &bold).width + 5.0;
    let italic = TextStyle {
        size: config.title_size * 0.85,
        style: FontStyle::Italic,
        ..Default::default()
    };
    let qualifier = if artifact.is_data { "Preliminary" } else { "Simulation" };
    canvas.text(main.left + offset, y, qualifier, &italic);

    let right_text = match artifact.lumi {
        Some(lumi) => format!("{lumi} fb\u{207b}\u{00b9} ({})", artifact.year),
        None => format!("({})", artifact.year),
    };
    let right_style = TextStyle {
        size: config.title_size * 0.85,
        anchor: TextAnchor::End,
        ..Default::default()
    };
    canvas.text(main.right(), y, &right_text, &right_style);
}

fn draw_annotation(
    canvas: &mut Canvas,
    main: &PlotArea,
    artifact: &StackArtifact,
    config: &RenderConfig,
) {
    let style = TextStyle { size: config.legend_size, ..Default::default() };
    let x = main.left + main.width * 0.04;
    let mut y = main.top + main.height * 0.06 + config.legend_size;
    for line in &artifact.annotation {
        canvas.text(x, y, line, &style);
        y += config.legend_size * 1.7;
    }
}

fn draw_legend(
    canvas: &mut Canvas,
    main: &PlotArea,
    artifact: &StackArtifact,
    config: &RenderConfig,
) {
    let entry_h = config.legend_size * 1.6;
    let swatch_w = 12.0;
    let col_w = main.width * 0.26;
    let n = artifact.legend.len();
    let rows = n.div_ceil(2);
    let x0 = main.right() - 2.0 * col_w - 8.0;
    let mut y = main.top + main.height * 0.05 + config.legend_size;

    // fit-type title above the entries
    let mut title = artifact.fittype.clone();
    if let Some(first) = title.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    let title_style = TextStyle { size: config.legend_size * 0.95, ..Default::default() };
    canvas.text(x0, y, &title, &title_style);
    y += entry_h;

    let style = TextStyle {
        size: config.legend_size,
        baseline: TextBaseline::Central,
        ..Default::default()
    };
    for (i, entry) in artifact.legend.iter().enumerate() {
        let col = i / rows;
        let row = i % rows;
        let ex = x0 + col as f64 * col_w;
        let ey = y + row as f64 * entry_h;
        if entry.key == "Data" || entry.key == "MC" || entry.key == "Toys" {
            let c = Color::rgb(0, 0, 0);
            canvas.line(ex + swatch_w / 2.0, ey - 4.0, ex + swatch_w / 2.0, ey + 4.0, &LineStyle::solid(c, 1.0));
            canvas.circle(ex + swatch_w / 2.0, ey, 1.8, &Style::filled(c));
        } else {
            let color = sample_color(&entry.key);
            let dashed = artifact.scaled_signals.iter().any(|s| s.sample == entry.key);
            let line = if dashed {
                LineStyle::dashed(color, 1.2)
            } else {
                LineStyle::solid(color, 1.2)
            };
            canvas.line(ex, ey, ex + swatch_w, ey, &line);
        }
        canvas.text(ex + swatch_w + 4.0, ey, &entry.label, &style);
    }
}
