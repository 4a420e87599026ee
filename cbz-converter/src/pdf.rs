use std::path::Path;

use anyhow::Result;
use camino::Utf8Path;
use cbz_tools::external::Tool;
use pdf::{
    enc::StreamFilter,
    file::FileOptions as PdfFileOptions,
    object::{Resolve, XObject},
};
use tracing::{debug, error};

/// Returns the first embedded jpeg of every page, as is.
/// Pages without a jpeg are skipped, scanned comics are made of exactly one jpeg per page.
pub fn extract_jpegs(path: impl AsRef<Path>) -> Result<Vec<Vec<u8>>> {
    let pdf = PdfFileOptions::cached().open(path)?;
    // We may have actually less images than the count but never more
    let mut jpegs = Vec::with_capacity(pdf.pages().count());

    for (index, page) in pdf.pages().enumerate() {
        let page = page?;
        let mut found = false;
        for resource in page.resources()?.xobjects.values() {
            let resource = match pdf.get(*resource) {
                Ok(resource) => resource,
                Err(err) => {
                    error!("failed to get resource from pdf: {err}");
                    continue;
                }
            };
            if let XObject::Image(image) = &*resource {
                let (image, filter) = match image.raw_image_data(&pdf) {
                    Ok(image_data) => image_data,
                    Err(err) => {
                        error!("failed to get image data: {err}");
                        continue;
                    }
                };
                if let Some(StreamFilter::DCTDecode(_)) = filter {
                    jpegs.push(image.to_vec());
                    found = true;
                    break;
                }
            }
        }
        if !found {
            debug!("no jpeg found on page {}", index + 1);
        }
    }

    Ok(jpegs)
}

/// `pdfimages -all` keeps the images in their native format, named `<prefix>-000.<ext>`
pub fn pdfimages_args(input: &Utf8Path, dest: &Utf8Path) -> Vec<String> {
    vec![
        "-all".to_string(),
        input.to_string(),
        dest.join("page").to_string(),
    ]
}

pub fn extract_with_pdfimages(pdfimages: &Tool, input: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    debug!("extracting images of {input} to {dest}");
    pdfimages.run(pdfimages_args(input, dest))?;
    Ok(())
}

/// A pdf with one page per jpeg, each page showing its jpeg as an image xobject
#[cfg(test)]
pub fn sample_pdf(jpegs: &[&[u8]]) -> Vec<u8> {
    let kids = (0..jpegs.len())
        .map(|index| format!("{} 0 R", 3 + 2 * index))
        .collect::<Vec<_>>()
        .join(" ");
    let mut objects = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", jpegs.len()).into_bytes(),
    ];
    for (index, jpeg) in jpegs.iter().enumerate() {
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] /Resources << /XObject << /Im0 {} 0 R >> >> >>",
                4 + 2 * index
            )
            .into_bytes(),
        );
        let mut image = format!(
            "<< /Type /XObject /Subtype /Image /Width 1 /Height 1 /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>\nstream\n",
            jpeg.len()
        )
        .into_bytes();
        image.extend_from_slice(jpeg);
        image.extend_from_slice(b"\nendstream");
        objects.push(image);
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        pdf.extend_from_slice(object);
        pdf.extend_from_slice(b"\nendobj\n");
    }

    let xref = pdf.len();
    let size = objects.len() + 1;
    pdf.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n").as_bytes(),
    );
    pdf
}
