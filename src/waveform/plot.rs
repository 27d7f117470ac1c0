use std::collections::BTreeMap;
use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;

use crate::types::ChannelId;
use crate::waveform::error::AnalysisError;
use crate::waveform::pipeline::Evaluation;
use crate::waveform::VoltageSeries;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub pass_tint: RGBColor,
    pub fail_tint: RGBColor,
    pub palette: Vec<RGBColor>,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 1200,
            background: RGBColor(10, 10, 10),
            pass_tint: RGBColor(12, 48, 12),
            fail_tint: RGBColor(60, 12, 12),
            palette: vec![YELLOW, CYAN, MAGENTA, GREEN, BLUE, RED, WHITE],
        }
    }
}

/// One panel per channel tinted by its verdict, plus an overlay of the phase pair.
pub fn render_evaluation_png(
    evaluation: &Evaluation,
    labels: &BTreeMap<ChannelId, String>,
    reference: ChannelId,
    target: ChannelId,
    style: PlotStyle,
) -> Result<Vec<u8>, AnalysisError> {
    if evaluation.series.is_empty() {
        return Err(AnalysisError::Plot("evaluation has no channels".into()));
    }
    if style.palette.is_empty() {
        return Err(AnalysisError::Plot("plot style has an empty palette".into()));
    }
    let buffer_len = (style.width as usize)
        .checked_mul(style.height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
        .ok_or_else(|| {
            AnalysisError::Plot(format!(
                "{}x{} canvas is too large",
                style.width, style.height
            ))
        })?;
    let label = |channel: ChannelId| {
        labels
            .get(&channel)
            .cloned()
            .unwrap_or_else(|| format!("Ch {channel}"))
    };
    let panel_count = evaluation.series.len() + 1;
    let rows = (panel_count + 1) / 2;
    let mut buffer = vec![0u8; buffer_len];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let panels = root.split_evenly((rows, 2));

        for (idx, ((&channel, series), panel)) in
            evaluation.series.iter().zip(panels.iter()).enumerate()
        {
            let passed = evaluation
                .verdict
                .channels
                .get(&channel)
                .map(|c| c.passed);
            let tint = match passed {
                Some(true) => style.pass_tint,
                Some(false) => style.fail_tint,
                None => style.background,
            };
            panel.fill(&tint)?;
            let caption = format!(
                "Channel {channel}, {}: {:.3} Vpp",
                label(channel),
                series.peak_to_peak()
            );
            let color = style.palette[idx % style.palette.len()];
            draw_traces(panel, &caption, &[(label(channel), series, color)])?;
        }

        if let (Some(a), Some(b), Some(panel)) = (
            evaluation.series.get(&reference),
            evaluation.series.get(&target),
            panels.get(evaluation.series.len()),
        ) {
            let tint = if evaluation.verdict.frequency_phase_passed {
                style.pass_tint
            } else {
                style.fail_tint
            };
            panel.fill(&tint)?;
            let caption = format!(
                "Phase: {:.2} deg, Frequency: {:.2} Hz",
                evaluation.spectral.phase_shift_deg, evaluation.spectral.dominant_frequency_hz
            );
            draw_traces(
                panel,
                &caption,
                &[
                    (label(reference), a, style.palette[0]),
                    (label(target), b, style.palette[1 % style.palette.len()]),
                ],
            )?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn draw_traces<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    caption: &str,
    traces: &[(String, &VoltageSeries, RGBColor)],
) -> Result<(), AnalysisError>
where
    DB::ErrorType: 'static,
{
    let len = traces.iter().map(|(_, s, _)| s.len()).max().unwrap_or(1).max(1);
    let y_min = traces.iter().map(|(_, s, _)| s.min).fold(f64::INFINITY, f64::min);
    let y_max = traces.iter().map(|(_, s, _)| s.max).fold(f64::NEG_INFINITY, f64::max);
    let pad = ((y_max - y_min) * 0.1).max(1e-3);
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(caption, ("sans-serif", 18).into_font().color(&WHITE))
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 30)
        .build_cartesian_2d(0f32..len as f32, (y_min - pad) as f32..(y_max + pad) as f32)?;
    chart
        .configure_mesh()
        .light_line_style(&WHITE.mix(0.1))
        .draw()?;
    for (name, series, color) in traces {
        let color = *color;
        let points = series
            .time_axis()
            .zip(series.samples.iter())
            .map(|(t, v)| (t as f32, *v as f32));
        chart
            .draw_series(LineSeries::new(points, &color))?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }
    chart
        .configure_series_labels()
        .border_style(&WHITE.mix(0.2))
        .draw()?;
    Ok(())
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AnalysisError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| AnalysisError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
