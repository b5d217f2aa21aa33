use crate::common::*;

/// Run `stream` on a background task, keeping up to `depth` items ready.
///
/// The task is spawned on the first poll of the returned stream, so the
/// returned stream can be created outside of a runtime. Production stops
/// after the first error item, which is still delivered.
pub fn prefetch<S, T>(stream: S, depth: usize) -> BoxStream<'static, Result<T>>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let depth = depth.max(1);

    stream::once(async move {
        let (tx, rx) = flume::bounded(depth);

        tokio::spawn(async move {
            let mut stream = Box::pin(stream);

            while let Some(item) = stream.next().await {
                let is_err = item.is_err();
                if tx.send_async(item).await.is_err() {
                    // receiver dropped
                    break;
                }
                if is_err {
                    break;
                }
            }
        });

        rx.into_stream()
    })
    .flatten()
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prefetch_preserves_order() {
        let items: Vec<usize> = prefetch(stream::iter((0..100).map(anyhow::Ok)), 2)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(items, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn prefetch_stops_after_error() {
        let source = stream::iter(vec![
            Ok(1),
            Err(format_err!("broken")),
            Ok(3),
        ]);
        let items: Vec<Result<usize>> = prefetch(source, 4).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
