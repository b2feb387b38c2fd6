/// 给写入、查询这类操作生成可以单独设置超时的方法。
///
/// 操作结构体需要有一个 `client: InfluxClient` 字段，选项只会修改这个操作持有的客户端副本
#[macro_export]
macro_rules! add_per_request_options {
    ($type_name:ty) => {
        impl $type_name {
            /// 此次操作的超时时间，单位为毫秒
            pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
                self.client.options.timeout_ms = Some(timeout_ms);
                self
            }

            pub fn timeout(self, timeout: std::time::Duration) -> Self {
                let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                self.timeout_ms(ms)
            }

            /// 即使 [`InfluxClientOptions`](`crate::InfluxClientOptions`) 设置了超时时间，此次操作也不会超时
            pub fn no_timeout(mut self) -> Self {
                self.client.options.timeout_ms = None;
                self
            }
        }
    };
}
