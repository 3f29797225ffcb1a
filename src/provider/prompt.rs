//! Instruction template wrapped around every user request.

use crate::extract::{END_MARKER, START_MARKER};

const TEMPLATE_HEAD: &str = "\
You are a professional web designer and helpful assistant.

Your task is to generate a complete, visually appealing, and responsive one-page website using only valid HTML and CSS.

Strict requirements:
- The design must be clean, modern, and user-friendly
- Use responsive layout techniques (e.g., flexbox, grid, and media queries)
- Ensure good spacing, color contrast, and mobile optimization
- Include a <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\"> in the <head>
- Use embedded <style> tags in the <head> for all CSS
- Use a Google Font (e.g., Inter, Roboto, or Poppins) loaded via <link> from fonts.googleapis.com
- Use <img> tags with **real, descriptive image URLs** (e.g., from https://images.pexels.com or https://picsum.photos)
- Do not use placeholder images (e.g., no \"placehold.co\", \"loremflickr\", or \"dummyimage.com\")
- Use semantic HTML5 elements where appropriate (e.g., <header>, <main>, <section>, <footer>)";

/// Render the full backend prompt for a user request.
pub fn render(request: &str) -> String {
    format!(
        "{head}\n- Begin your response with {start} and end with {end}\n- Output only a complete HTML document, with no explanations, markdown, or extra text\n\nCurrent request: \"{request}\"",
        head = TEMPLATE_HEAD,
        start = START_MARKER,
        end = END_MARKER,
        request = request.trim(),
    )
}
