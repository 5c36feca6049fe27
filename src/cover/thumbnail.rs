use image::codecs::jpeg::JpegEncoder;
use image::{
    imageops::FilterType, DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, Limits, RgbImage,
    RgbaImage,
};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Seek};
use std::path::PathBuf;
use tracing::{debug, trace, warn};

use crate::config::CoverSettings;
use crate::error::IngestError;

/// Bytes per pixel assumed when sizing a generic decode (RGBA8)
const FULL_DECODE_BYTES_PER_PIXEL: u64 = 4;

/// How many target-sized RGBA buffers a format without a sampling decoder
/// may allocate. Allows a full decode only up to a sample size of 8.
const FULL_DECODE_HEADROOM: u64 = 64;

/// Where a cover image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverSource {
    /// Encoded image bytes already in memory
    Bytes(Vec<u8>),
    /// Image file on disk; read once per pass
    File(PathBuf),
}

trait ImageStream: BufRead + Seek {}
impl<T: BufRead + Seek> ImageStream for T {}

impl CoverSource {
    /// Fresh reader positioned at the start of the image
    fn open(&self) -> Result<Box<dyn ImageStream + '_>, IngestError> {
        Ok(match self {
            CoverSource::Bytes(bytes) => Box::new(Cursor::new(bytes.as_slice())),
            CoverSource::File(path) => Box::new(BufReader::new(File::open(path)?)),
        })
    }
}

/// Native size and format, read from the header only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

/// Turn `source` into bounded-size JPEG bytes.
///
/// Two passes over the source: the header for the native size, then a
/// decode at the power-of-two sample size that keeps the result at least
/// `max_width` x `max_height`.
pub fn ingest(source: &CoverSource, settings: &CoverSettings) -> Result<Vec<u8>, IngestError> {
    let settings = settings.normalized();

    // Pass 1: dimensions only
    let header = read_header(source)?;
    let sample_size = calculate_sample_size(header.width, header.height, settings.max_width, settings.max_height);
    debug!(
        width = header.width,
        height = header.height,
        format = ?header.format,
        sample_size,
        "read cover image header"
    );

    // Pass 2: pixels, already reduced
    let image = decode_sampled(source, &header, sample_size)?;

    let bytes = encode_jpeg(&image, settings.quality)?;
    debug!(
        width = image.width(),
        height = image.height(),
        bytes = bytes.len(),
        "encoded cover thumbnail"
    );
    Ok(bytes)
}

/// Read the image header without materializing pixel data
pub fn read_header(source: &CoverSource) -> Result<Header, IngestError> {
    let reader = ImageReader::new(source.open()?).with_guessed_format()?;
    let format = reader.format();
    let (width, height) = reader.into_dimensions().map_err(IngestError::Header)?;
    if width == 0 || height == 0 {
        return Err(IngestError::EmptyImage);
    }
    Ok(Header { width, height, format })
}

/// Largest power of two `k` such that halving once more would drop either
/// dimension below the requested bound.
///
/// Decoding at `width / k` x `height / k` gives the smallest buffer that is
/// still at least as large as the target; final scaling is left to the caller.
pub fn calculate_sample_size(width: u32, height: u32, req_width: u32, req_height: u32) -> u32 {
    let req_width = req_width.max(1);
    let req_height = req_height.max(1);

    let mut sample_size = 1;
    if height > req_height || width > req_width {
        let half_height = height / 2;
        let half_width = width / 2;
        while half_height / sample_size >= req_height && half_width / sample_size >= req_width {
            sample_size *= 2;
        }
    }
    sample_size
}

/// Dimensions produced by decoding at `sample_size`
pub fn sampled_dimensions(width: u32, height: u32, sample_size: u32) -> (u32, u32) {
    let sample_size = sample_size.max(1);
    ((width / sample_size).max(1), (height / sample_size).max(1))
}

/// Decode pixel data at the given sample size.
///
/// JPEG is scaled inside the decoder and PNG is box-averaged row by row, so
/// neither allocates the full-resolution buffer. Other formats are decoded
/// whole, but only when that fits [`full_decode_budget`].
pub fn decode_sampled(source: &CoverSource, header: &Header, sample_size: u32) -> Result<DynamicImage, IngestError> {
    let (target_width, target_height) = sampled_dimensions(header.width, header.height, sample_size);

    let sampled = match header.format {
        Some(ImageFormat::Jpeg) => decode_jpeg_scaled(source, target_width, target_height)?,
        Some(ImageFormat::Png) => decode_png_sampled(source, sample_size, target_width, target_height)?,
        _ => None,
    };
    let decoded = match sampled {
        Some(image) => image,
        None => decode_bounded(source, header, full_decode_budget(target_width, target_height))?,
    };

    if decoded.width() == target_width && decoded.height() == target_height {
        return Ok(decoded);
    }

    trace!(
        from_width = decoded.width(),
        from_height = decoded.height(),
        target_width,
        target_height,
        "resampling decoded cover"
    );
    Ok(decoded.resize_exact(target_width, target_height, FilterType::Lanczos3))
}

/// Allocation allowed for a whole-image decode that lands on the given size
pub fn full_decode_budget(target_width: u32, target_height: u32) -> u64 {
    u64::from(target_width) * u64::from(target_height) * FULL_DECODE_BYTES_PER_PIXEL * FULL_DECODE_HEADROOM
}

/// DCT-domain JPEG decode at the smallest of 1/8, 1/4, 1/2, 1 that covers the
/// target. Returns `None` for pixel formats better left to the generic path.
fn decode_jpeg_scaled(
    source: &CoverSource,
    target_width: u32,
    target_height: u32,
) -> Result<Option<DynamicImage>, IngestError> {
    let mut decoder = jpeg_decoder::Decoder::new(source.open()?);
    decoder.read_info().map_err(|e| IngestError::Decode(e.to_string()))?;

    let request_width = u16::try_from(target_width).unwrap_or(u16::MAX);
    let request_height = u16::try_from(target_height).unwrap_or(u16::MAX);
    let (width, height) = decoder
        .scale(request_width, request_height)
        .map_err(|e| IngestError::Decode(e.to_string()))?;

    let pixels = decoder.decode().map_err(|e| IngestError::Decode(e.to_string()))?;
    let pixel_format = decoder
        .info()
        .map(|info| info.pixel_format)
        .ok_or_else(|| IngestError::Decode("missing JPEG frame info".to_string()))?;

    let (width, height) = (u32::from(width), u32::from(height));
    let image = match pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        jpeg_decoder::PixelFormat::L8 => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        other => {
            debug!(format = ?other, "JPEG pixel format not scaled in-decoder");
            return Ok(None);
        }
    };

    image
        .map(Some)
        .ok_or_else(|| IngestError::Decode("decoded JPEG buffer is shorter than its dimensions".to_string()))
}

/// Streaming PNG decode that averages each `k` x `k` block as rows arrive.
///
/// Only one source row and one row of accumulators are held at a time.
/// Returns `None` for interlaced images, whose rows arrive out of order.
fn decode_png_sampled(
    source: &CoverSource,
    sample_size: u32,
    target_width: u32,
    target_height: u32,
) -> Result<Option<DynamicImage>, IngestError> {
    let mut decoder = png::Decoder::new(source.open()?);
    // Palette and low bit depths expand to 8 bits, 16-bit samples are cut to 8
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(|e| IngestError::Decode(e.to_string()))?;

    if reader.info().interlaced {
        debug!("interlaced PNG not sampled while streaming");
        return Ok(None);
    }
    let (color_type, bit_depth) = reader.output_color_type();
    if bit_depth != png::BitDepth::Eight {
        debug!(?bit_depth, "PNG bit depth not sampled while streaming");
        return Ok(None);
    }

    let channels = color_type.samples();
    let k = sample_size.max(1) as usize;
    let (width, height) = (target_width as usize, target_height as usize);
    let block_area = (k * k) as u64;

    let mut sums = vec![0u64; width * channels];
    let mut pixels = Vec::with_capacity(width * height * channels);
    let mut row_index = 0;

    while row_index / k < height {
        let Some(row) = reader.next_row().map_err(|e| IngestError::Decode(e.to_string()))? else {
            break;
        };
        let data = row.data();
        for (column, sum) in sums.chunks_exact_mut(channels).enumerate() {
            let start = column * k * channels;
            let Some(block) = data.get(start..start + k * channels) else {
                break;
            };
            for pixel in block.chunks_exact(channels) {
                for (acc, &sample) in sum.iter_mut().zip(pixel) {
                    *acc += u64::from(sample);
                }
            }
        }

        row_index += 1;
        if row_index % k == 0 {
            pixels.extend(sums.iter().map(|&total| (total / block_area) as u8));
            sums.fill(0);
        }
    }

    let image = match color_type {
        png::ColorType::Grayscale => GrayImage::from_raw(target_width, target_height, pixels).map(DynamicImage::ImageLuma8),
        png::ColorType::GrayscaleAlpha => {
            GrayAlphaImage::from_raw(target_width, target_height, pixels).map(DynamicImage::ImageLumaA8)
        }
        png::ColorType::Rgb => RgbImage::from_raw(target_width, target_height, pixels).map(DynamicImage::ImageRgb8),
        png::ColorType::Rgba => RgbaImage::from_raw(target_width, target_height, pixels).map(DynamicImage::ImageRgba8),
        other => {
            debug!(color_type = ?other, "PNG color type not sampled while streaming");
            return Ok(None);
        }
    };

    image
        .map(Some)
        .ok_or_else(|| IngestError::Decode("PNG ended before the sampled rows were complete".to_string()))
}

/// Whole-image decode for formats without a sampling decoder.
///
/// Sources whose full RGBA buffer would exceed `budget` are rejected from the
/// header alone; the same figure caps the decoder's allocations.
fn decode_bounded(source: &CoverSource, header: &Header, budget: u64) -> Result<DynamicImage, IngestError> {
    let required = u64::from(header.width) * u64::from(header.height) * FULL_DECODE_BYTES_PER_PIXEL;
    if required > budget {
        warn!(
            width = header.width,
            height = header.height,
            format = ?header.format,
            required,
            budget,
            "cover too large to decode without sampling"
        );
        return Err(IngestError::TooLarge {
            width: header.width,
            height: header.height,
        });
    }

    let mut limits = Limits::default();
    limits.max_alloc = Some(budget);

    let mut reader = ImageReader::new(source.open()?).with_guessed_format()?;
    reader.limits(limits);
    reader.decode().map_err(|e| IngestError::Decode(e.to_string()))
}

/// Encode as baseline JPEG; alpha is dropped
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, IngestError> {
    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(IngestError::Encode)?;
    Ok(bytes)
}
