use std::path::Path;

use tokio::{
    fs::{self, File},
    io::{self, AsyncBufReadExt, AsyncWriteExt, Lines},
};

/// Read a file from the given path into a list of strings
pub async fn read_file<P: AsRef<Path>>(path: P) -> io::Result<Vec<String>> {
    let mut r = file_reader(path).await?;
    let mut lines = Vec::new();

    while let Some(line) = r.next_line().await? {
        lines.push(line);
    }

    Ok(lines)
}

/// Write each line followed by a newline, replacing any existing file
pub async fn write_lines<P, I, S>(path: P, lines: I) -> io::Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut w = io::BufWriter::new(File::create(path).await?);

    for line in lines {
        w.write_all(line.as_ref().as_bytes()).await?;
        w.write_all(b"\n").await?;
    }

    w.flush().await
}

async fn file_reader<P: AsRef<Path>>(path: P) -> io::Result<Lines<io::BufReader<File>>> {
    let f = File::open(path).await?;

    Ok(io::BufReader::new(f).lines())
}
