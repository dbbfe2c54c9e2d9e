use pcl_raster::{
    ColorModel, CompressionMethod, Config, Error, RasterEvent, RasterLog, RasterSink, Rasterizer, Rendering,
};

const WIDTH: usize = 64;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Solid bands on the left, a diagonal ramp on the right, white at the bottom.
fn page(width: usize, channels: usize, height: usize) -> Vec<Vec<u8>> {
    (0..height)
        .map(|y| {
            if y >= height - 4 {
                return Vec::new();
            }
            let mut line = Vec::with_capacity(width * channels);
            for x in 0..width {
                for c in 0..channels {
                    let value = if x < width * 3 / 4 {
                        ((y / 8) * 60 + c * 40) as u8
                    } else {
                        ((x * 3 + y * 5 + c * 50) % 256) as u8
                    };
                    line.push(value);
                }
            }
            line
        })
        .collect()
}

/// Group boundaries and plane counts of a recorded page.
fn groups(log: &RasterLog) -> Vec<usize> {
    let mut groups = Vec::new();
    let mut planes = 0;
    for event in log.events() {
        if let RasterEvent::Plane { last_in_group, .. } = event {
            planes += 1;
            if *last_in_group {
                groups.push(planes);
                planes = 0;
            }
        }
    }
    assert_eq!(planes, 0, "unterminated group");
    groups
}

#[test]
fn test_cmyk_diffusion_page() {
    init_logger();
    let config = Config::new(ColorModel::Cmyk, WIDTH)
        .black_levels(4)
        .rendering(Rendering::FloydSteinberg)
        .compression(CompressionMethod::DeltaRow);
    let mut rasterizer = Rasterizer::new(config).unwrap();
    assert_eq!(rasterizer.layout().plane_count(), 5);

    let mut log = RasterLog::new();
    let summary = rasterizer.print_page(page(WIDTH, 4, 40), &mut log).unwrap();

    let events = log.events();
    assert_eq!(events.first(), Some(&RasterEvent::BeginRaster));
    assert_eq!(events.last(), Some(&RasterEvent::EndRaster));
    assert!(summary.groups_sent > 0);
    assert_eq!(summary.groups_sent + summary.groups_skipped, 40);

    let sizes = groups(&log);
    assert_eq!(sizes.len(), summary.groups_sent);
    assert!(sizes.iter().all(|&planes| planes == 5));

    for event in events {
        if let RasterEvent::SetCompression(method) = event {
            assert!(matches!(
                method,
                CompressionMethod::None | CompressionMethod::DeltaRow | CompressionMethod::PackBits
            ));
        }
    }
    let switches = events
        .iter()
        .filter(|e| matches!(e, RasterEvent::SetCompression(_)))
        .count();
    assert_eq!(log.wire_octets(), summary.octets_sent + 2 * switches);
}

#[test]
fn test_compression_pays_off() {
    init_logger();
    let width = 256;
    let lines = page(width, 1, 48);
    let mut costs = Vec::new();

    for &method in [
        CompressionMethod::None,
        CompressionMethod::RunLength,
        CompressionMethod::PackBits,
        CompressionMethod::DeltaRow,
        CompressionMethod::CompressedReplacementDeltaRow,
    ]
    .iter()
    {
        let config = Config::new(ColorModel::Gray, width)
            .black_levels(4)
            .compression(method);
        let mut rasterizer = Rasterizer::new(config).unwrap();
        let mut log = RasterLog::new();
        rasterizer.print_page(&lines, &mut log).unwrap();
        costs.push((method, log.wire_octets()));
    }

    let raw = costs[0].1;
    for &(method, cost) in &costs[1..] {
        assert!(cost < raw, "{:?}: {} >= {}", method, cost, raw);
    }
}

#[test]
fn test_black_sent_last() {
    init_logger();
    let config = Config::new(ColorModel::Cmyk, WIDTH).order_cmyk(true);
    let mut rasterizer = Rasterizer::new(config).unwrap();
    let mut log = RasterLog::new();

    // pure black: only the K plane has data
    let line: Vec<u8> = (0..WIDTH).flat_map(|_| vec![255u8, 0, 0, 0]).collect();
    rasterizer.print_page(vec![line], &mut log).unwrap();

    let planes: Vec<(usize, bool)> = log
        .events()
        .iter()
        .filter_map(|e| match e {
            RasterEvent::Plane { data, last_in_group } => Some((data.len(), *last_in_group)),
            _ => None,
        })
        .collect();
    assert_eq!(
        planes,
        vec![(0, false), (0, false), (0, false), (WIDTH / 8, true)]
    );
}

/// Sink losing its connection after a number of planes.
struct FlakySink {
    planes_left: usize,
    log: RasterLog,
}

impl RasterSink for FlakySink {
    fn begin_raster(&mut self) -> Result<(), Error> {
        self.log.begin_raster()
    }

    fn set_compression(&mut self, method: CompressionMethod) -> Result<(), Error> {
        self.log.set_compression(method)
    }

    fn transfer_plane(&mut self, data: &[u8], last_in_group: bool) -> Result<(), Error> {
        if self.planes_left == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "printer went away").into());
        }
        self.planes_left -= 1;
        self.log.transfer_plane(data, last_in_group)
    }

    fn skip_groups(&mut self, count: usize) -> Result<(), Error> {
        self.log.skip_groups(count)
    }

    fn end_raster(&mut self) -> Result<(), Error> {
        self.log.end_raster()
    }
}

#[test]
fn test_sink_errors_propagate() {
    init_logger();
    let config = Config::new(ColorModel::Gray, WIDTH).compression(CompressionMethod::DeltaRow);
    let mut rasterizer = Rasterizer::new(config).unwrap();
    let lines = page(WIDTH, 1, 20);

    let mut flaky = FlakySink {
        planes_left: 3,
        log: RasterLog::new(),
    };
    match rasterizer.print_page(&lines, &mut flaky) {
        Err(Error::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe),
        other => panic!("unexpected {:?}", other),
    }

    // the next page starts from scratch
    let mut first = RasterLog::new();
    rasterizer.print_page(&lines, &mut first).unwrap();
    let mut fresh = Rasterizer::new(rasterizer.config().clone()).unwrap();
    let mut second = RasterLog::new();
    fresh.print_page(&lines, &mut second).unwrap();
    assert_eq!(first.events(), second.events());
}
