use image::GenericImageView;
use log::info;
use pcl_raster::{ColorModel, CompressionMethod, Config, RasterLog, Rasterizer, Rendering};
use std::env;

const METHODS: [CompressionMethod; 5] = [
    CompressionMethod::None,
    CompressionMethod::RunLength,
    CompressionMethod::PackBits,
    CompressionMethod::DeltaRow,
    CompressionMethod::CompressedReplacementDeltaRow,
];

/// Rasterize an image (or a generated test pattern) with every compression
/// method and report what each one would send to the printer.
///
/// cargo run --example rasterize_image -- [gray|cmyk] [path/to/image.png]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{}:{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();

    let mut args = env::args().skip(1);
    let model = match args.next().as_deref() {
        Some("cmyk") => ColorModel::Cmyk,
        Some("gray") | None => ColorModel::Gray,
        Some(other) => {
            eprintln!("Unknown color model: {}. Use gray or cmyk.", other);
            std::process::exit(1);
        }
    };

    let image = match args.next() {
        Some(path) => image::open(&path)?,
        None => test_pattern(600, 400),
    };
    let (width, height) = image.dimensions();
    info!("image {}x{}, {:?}", width, height, model);

    let lines = scan_lines(&image, model);

    for &rendering in [Rendering::Threshold, Rendering::FloydSteinberg].iter() {
        for &method in METHODS.iter() {
            let config = Config::new(model, width as usize)
                .black_levels(4)
                .rendering(rendering)
                .compression(method)
                .order_cmyk(model == ColorModel::Cmyk);
            let mut rasterizer = Rasterizer::new(config)?;
            let mut log = RasterLog::new();
            let summary = rasterizer.print_page(&lines, &mut log)?;

            println!(
                "{:?} {:?}: {} octets on the wire ({} groups sent, {} skipped)",
                rendering,
                method,
                log.wire_octets(),
                summary.groups_sent,
                summary.groups_skipped
            );
        }
    }

    Ok(())
}

/// Diagonal gradient with a white border, in RGB.
fn test_pattern(width: u32, height: u32) -> image::DynamicImage {
    let buffer = image::RgbImage::from_fn(width, height, |x, y| {
        if x < 40 || y < 40 || x >= width - 40 || y >= height - 40 {
            return image::Rgb([255, 255, 255]);
        }
        let r = (x * 255 / width) as u8;
        let g = (y * 255 / height) as u8;
        let b = ((x + y) * 255 / (width + height)) as u8;
        image::Rgb([r, g, b])
    });
    image::DynamicImage::ImageRgb8(buffer)
}

/// Scan lines in the sample order of `model`, zero meaning no ink.
fn scan_lines(image: &image::DynamicImage, model: ColorModel) -> Vec<Vec<u8>> {
    match model {
        ColorModel::Cmyk => {
            let rgb = image.to_rgb8();
            rgb.rows()
                .map(|row| {
                    row.flat_map(|pixel| {
                        let [r, g, b] = pixel.0;
                        let (c, m, y) = (255 - r, 255 - g, 255 - b);
                        let k = c.min(m).min(y);
                        vec![k, c - k, m - k, y - k]
                    })
                    .collect()
                })
                .collect()
        }
        _ => {
            let gray = image.to_luma8();
            gray.rows()
                .map(|row| row.map(|pixel| 255 - pixel.0[0]).collect())
                .collect()
        }
    }
}
