use crate::domain::model::ImageLink;
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

/// One full-disk page URL per calendar day in `[start, end]`.
pub fn day_page_urls(
    base_url: &str,
    image_type: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<String>> {
    if start > end {
        return Err(EtlError::ValidationError {
            message: format!("start date {} is after end date {}", start, end),
        });
    }

    let base = base_url.trim_end_matches('/');
    Ok(start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| {
            format!(
                "{}/full_disk.php?date={}&type={}&region=",
                base,
                day.format("%Y%m%d"),
                image_type
            )
        })
        .collect())
}

fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| EtlError::SelectorError {
        selector: sel_str.to_string(),
    })
}

/// Absolute `<img>` URLs on the page whose text contains `filter`.
pub fn extract_image_links(html: &str, page_url: &Url, filter: &str) -> Result<Vec<ImageLink>> {
    let doc = Html::parse_document(html);
    let img_selector = create_selector("img")?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for img in doc.select(&img_selector) {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        let Ok(mut url) = page_url.join(src) else {
            tracing::debug!("Skipping unresolvable image src: {}", src);
            continue;
        };
        url.set_query(None);
        url.set_fragment(None);

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            continue;
        }
        if !url.as_str().contains(filter) {
            continue;
        }

        let Some(file_name) = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            continue;
        };

        if seen.insert(url.as_str().to_string()) {
            links.push(ImageLink { url, file_name });
        }
    }

    Ok(links)
}

pub async fn fetch_page(client: &Client, url: &str) -> Result<String> {
    let html = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(html)
}

/// Streams the image into `dir/file_name` with a byte progress bar.
pub async fn download_image(client: &Client, link: &ImageLink, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let mut response = client.get(link.url.clone()).send().await?.error_for_status()?;
    let total = response.content_length().unwrap_or(0);

    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    progress.set_message(format!("Downloading {}", link.file_name));

    let path = dir.join(&link.file_name);
    let written = match stream_to_file(&mut response, &path, &progress).await {
        Ok(written) => written,
        Err(e) => {
            progress.abandon();
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
    };
    progress.finish_and_clear();

    tracing::debug!("Saved {} ({} bytes)", path.display(), written);
    Ok(path)
}

async fn stream_to_file(
    response: &mut reqwest::Response,
    path: &Path,
    progress: &ProgressBar,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        progress.inc(chunk.len() as u64);
    }
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_page_urls_cover_inclusive_range() {
        let urls = day_page_urls(
            "https://solarmonitor.org/",
            "shmi_maglc",
            date(2011, 9, 29),
            date(2011, 10, 2),
        )
        .unwrap();

        assert_eq!(urls.len(), 4);
        assert_eq!(
            urls[0],
            "https://solarmonitor.org/full_disk.php?date=20110929&type=shmi_maglc&region="
        );
        assert!(urls[1].contains("date=20110930"));
        assert!(urls[2].contains("date=20111001"));
        assert!(urls[3].contains("date=20111002"));
    }

    #[test]
    fn test_day_page_urls_skip_impossible_dates() {
        let urls =
            day_page_urls("https://solarmonitor.org", "shmi_maglc", date(2012, 2, 28), date(2012, 3, 1))
                .unwrap();
        let dates: Vec<&str> = urls
            .iter()
            .map(|u| &u[u.find("date=").unwrap() + 5..u.find("&type").unwrap()])
            .collect();
        assert_eq!(dates, vec!["20120228", "20120229", "20120301"]);
    }

    #[test]
    fn test_day_page_urls_reject_reversed_range() {
        assert!(day_page_urls("https://x.org", "t", date(2012, 1, 2), date(2012, 1, 1)).is_err());
    }

    #[test]
    fn test_extract_image_links_filters_and_resolves() {
        let html = r#"
            <html><body>
              <img src="common_files/logo.png">
              <img alt="no source">
              <img src="data/2011/09/11/pngs/shmi/shmi_maglc_fd_20110911_000000.png?t=1#x">
              <img src="/data/2011/09/11/pngs/shmi/shmi_maglc_fd_20110911_120000.png">
              <img src="data/2011/09/11/pngs/shmi/shmi_maglc_fd_20110911_000000.png">
              <img src="data/2011/09/11/pngs/shmi/shmi_maglc_ar_11289.png">
            </body></html>
        "#;
        let page = Url::parse("https://solarmonitor.org/full_disk.php?date=20110911").unwrap();

        let links = extract_image_links(html, &page, "shmi_maglc_fd").unwrap();

        assert_eq!(links.len(), 2);
        assert_eq!(
            links[0].url.as_str(),
            "https://solarmonitor.org/data/2011/09/11/pngs/shmi/shmi_maglc_fd_20110911_000000.png"
        );
        assert_eq!(links[0].file_name, "shmi_maglc_fd_20110911_000000.png");
        assert_eq!(links[1].file_name, "shmi_maglc_fd_20110911_120000.png");
    }

    #[test]
    fn test_extract_image_links_ignores_non_http_sources() {
        let html = r#"<img src="data:image/png;base64,shmi_maglc_fd"><img src="ftp://h/shmi_maglc_fd.png">"#;
        let page = Url::parse("https://solarmonitor.org/").unwrap();
        assert!(extract_image_links(html, &page, "shmi_maglc_fd").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_image_streams_body_to_disk() {
        use httpmock::prelude::*;

        let server = MockServer::start();
        let body: Vec<u8> = (0..200_000u32).map(|v| (v % 251) as u8).collect();
        server.mock(|when, then| {
            when.method(GET).path("/big.png");
            then.status(200).body(body.clone());
        });
        let temp_dir = tempfile::TempDir::new().unwrap();
        let link = ImageLink {
            url: Url::parse(&server.url("/big.png")).unwrap(),
            file_name: "big.png".to_string(),
        };

        let path = download_image(&Client::new(), &link, &temp_dir.path().join("out"))
            .await
            .unwrap();

        assert_eq!(path, temp_dir.path().join("out").join("big.png"));
        assert_eq!(std::fs::read(path).unwrap(), body);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_file() {
        use httpmock::prelude::*;

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/gone.png");
            then.status(404);
        });
        let temp_dir = tempfile::TempDir::new().unwrap();
        let link = ImageLink {
            url: Url::parse(&server.url("/gone.png")).unwrap(),
            file_name: "gone.png".to_string(),
        };

        assert!(download_image(&Client::new(), &link, temp_dir.path()).await.is_err());
        assert!(!temp_dir.path().join("gone.png").exists());
    }
}
