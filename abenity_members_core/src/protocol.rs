//! SSO 载荷加密签名协议
//!
//! 协议流程：
//! 1. 载荷表单编码后，用每次新生成的对称密钥与 IV 做 CBC 模式加密（默认 3DES，PKCS#7 填充）
//! 2. 用厂商 RSA 公钥以 PKCS#1 v1.5 封装对称密钥
//! 3. 用调用方 RSA 私钥对密文的 base64 文本做 MD5withRSA 签名
//! 4. 密文、封装密钥、IV、签名分别做 base64 + URL 编码，并追加固定后缀 "decode"
//!
//! 密钥文件每次调用重新读取，不做缓存。

use crate::config::KeyPaths;
use crate::error::{Error, Result};
use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use des::TdesEde3;
use md5::Md5;
use rand::RngCore;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use std::path::Path;
use zeroize::Zeroizing;

/// 线上编码后缀
pub const ARTIFACT_SUFFIX: &str = "decode";

/// 载荷对称加密算法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SymmetricAlgorithm {
    /// 3DES-EDE3-CBC，厂商当前要求的算法
    #[default]
    TripleDesCbc,
    /// AES-256-CBC
    Aes256Cbc,
}

impl SymmetricAlgorithm {
    pub fn key_len(&self) -> usize {
        match self {
            SymmetricAlgorithm::TripleDesCbc => 24,
            SymmetricAlgorithm::Aes256Cbc => 32,
        }
    }

    /// IV 长度即分组长度
    pub fn iv_len(&self) -> usize {
        match self {
            SymmetricAlgorithm::TripleDesCbc => 8,
            SymmetricAlgorithm::Aes256Cbc => 16,
        }
    }
}

/// 对称加密结果，仅在单次调用内存在
pub struct EncryptedPayload {
    pub cipher_text: Vec<u8>,
    pub iv: Vec<u8>,
    pub key: Zeroizing<Vec<u8>>,
}

/// 编码完成、可直接放入请求体的四个字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub payload: String,
    pub signature: String,
    pub cipher: String,
    pub iv: String,
}

/// RSA 密钥对：调用方私钥用于签名，厂商公钥用于封装对称密钥
#[derive(Clone)]
pub struct KeyMaterial {
    pub signing_key: RsaPrivateKey,
    pub encryption_key: RsaPublicKey,
}

impl KeyMaterial {
    /// 从 PEM 文本解析，私钥支持 PKCS#1 / PKCS#8，公钥支持 PKCS#1 / SPKI
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self> {
        Ok(Self {
            signing_key: parse_private_key(private_pem)?,
            encryption_key: parse_public_key(public_pem)?,
        })
    }

    /// 从配置的路径读取密钥文件
    pub async fn load(paths: &KeyPaths) -> Result<Self> {
        let private_pem = read_key_file(&paths.private_key_path).await?;
        let public_pem = read_key_file(&paths.public_key_path).await?;
        Self::from_pem(&private_pem, &public_pem)
    }
}

async fn read_key_file(path: &Path) -> Result<Zeroizing<String>> {
    tokio::fs::read_to_string(path)
        .await
        .map(Zeroizing::new)
        .map_err(|e| Error::Config(format!("Failed to read key file {}: {}", path.display(), e)))
}

/// 解析 RSA 私钥 PEM
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey> {
    let parsed = if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| e.to_string())
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| Error::Config(format!("Malformed private key PEM: {}", e)))
}

/// 解析 RSA 公钥 PEM
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey> {
    let parsed = if pem.contains("BEGIN RSA PUBLIC KEY") {
        RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| e.to_string())
    } else {
        RsaPublicKey::from_public_key_pem(pem).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| Error::Config(format!("Malformed public key PEM: {}", e)))
}

/// 加密签名协议
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCrypto {
    algorithm: SymmetricAlgorithm,
}

impl EnvelopeCrypto {
    pub fn new(algorithm: SymmetricAlgorithm) -> Self {
        Self { algorithm }
    }

    /// 生成新的对称密钥与 IV 并加密
    pub fn encrypt_payload(&self, plaintext: &[u8]) -> Result<EncryptedPayload> {
        let mut rng = rand::thread_rng();
        let mut key = Zeroizing::new(vec![0u8; self.algorithm.key_len()]);
        rng.fill_bytes(key.as_mut_slice());
        let mut iv = vec![0u8; self.algorithm.iv_len()];
        rng.fill_bytes(&mut iv);

        let cipher_text = match self.algorithm {
            SymmetricAlgorithm::TripleDesCbc => {
                cbc::Encryptor::<TdesEde3>::new_from_slices(key.as_slice(), &iv)
                    .map_err(|e| Error::Crypto(e.to_string()))?
                    .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
            }
            SymmetricAlgorithm::Aes256Cbc => {
                cbc::Encryptor::<Aes256>::new_from_slices(key.as_slice(), &iv)
                    .map_err(|e| Error::Crypto(e.to_string()))?
                    .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
            }
        };

        Ok(EncryptedPayload {
            cipher_text,
            iv,
            key,
        })
    }

    /// 解密对称密文
    pub fn decrypt_payload(&self, cipher_text: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        let plaintext = match self.algorithm {
            SymmetricAlgorithm::TripleDesCbc => cbc::Decryptor::<TdesEde3>::new_from_slices(key, iv)
                .map_err(|e| Error::Crypto(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(cipher_text),
            SymmetricAlgorithm::Aes256Cbc => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(|e| Error::Crypto(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(cipher_text),
        };
        plaintext.map_err(|_| Error::Crypto("Invalid padding in decrypted payload".to_string()))
    }

    /// 加密、封装密钥、签名并编码
    pub fn seal(&self, plaintext: &[u8], keys: &KeyMaterial) -> Result<SealedPayload> {
        let encrypted = self.encrypt_payload(plaintext)?;
        let wrapped_key = wrap_key(&keys.encryption_key, &encrypted.key)?;
        let signature = sign(&keys.signing_key, signature_input(&encrypted.cipher_text).as_bytes())?;

        Ok(SealedPayload {
            payload: encode_artifact(&encrypted.cipher_text),
            signature: encode_artifact(&signature),
            cipher: encode_artifact(&wrapped_key),
            iv: encode_artifact(&encrypted.iv),
        })
    }

    /// `seal` 的逆过程：用发送方公钥验签，用接收方私钥解封密钥后解密
    pub fn unseal(
        &self,
        sealed: &SealedPayload,
        recipient_key: &RsaPrivateKey,
        sender_key: &RsaPublicKey,
    ) -> Result<Vec<u8>> {
        let cipher_text = decode_artifact(&sealed.payload)?;
        let signature = decode_artifact(&sealed.signature)?;
        if !verify(sender_key, signature_input(&cipher_text).as_bytes(), &signature) {
            return Err(Error::Crypto("Signature verification failed".to_string()));
        }

        let key = Zeroizing::new(
            recipient_key
                .decrypt(Pkcs1v15Encrypt, &decode_artifact(&sealed.cipher)?)
                .map_err(|e| Error::Crypto(e.to_string()))?,
        );
        let iv = decode_artifact(&sealed.iv)?;
        self.decrypt_payload(&cipher_text, &key, &iv)
    }
}

/// 签名覆盖的是密文的 base64 文本
fn signature_input(cipher_text: &[u8]) -> String {
    BASE64.encode(cipher_text)
}

/// PKCS#1 v1.5 封装对称密钥
pub fn wrap_key(public_key: &RsaPublicKey, key: &[u8]) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();
    public_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, key)
        .map_err(|e| Error::Crypto(e.to_string()))
}

/// MD5withRSA 签名
pub fn sign(private_key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>> {
    let signing_key = SigningKey::<Md5>::new(private_key.clone());
    signing_key
        .try_sign(data)
        .map(|signature| signature.to_vec())
        .map_err(|e| Error::Crypto(e.to_string()))
}

/// MD5withRSA 验签
pub fn verify(public_key: &RsaPublicKey, data: &[u8], signature: &[u8]) -> bool {
    let verifying_key = VerifyingKey::<Md5>::new(public_key.clone());
    match Signature::try_from(signature) {
        Ok(signature) => verifying_key.verify(data, &signature).is_ok(),
        Err(_) => false,
    }
}

/// base64 + URL 编码 + "decode" 后缀
pub fn encode_artifact(data: &[u8]) -> String {
    format!("{}{}", urlencoding::encode(&BASE64.encode(data)), ARTIFACT_SUFFIX)
}

/// `encode_artifact` 的逆过程
pub fn decode_artifact(encoded: &str) -> Result<Vec<u8>> {
    let stripped = encoded
        .strip_suffix(ARTIFACT_SUFFIX)
        .ok_or_else(|| Error::Encoding(format!("Missing \"{}\" suffix", ARTIFACT_SUFFIX)))?;
    let base64_text = urlencoding::decode(stripped).map_err(|e| Error::Encoding(e.to_string()))?;
    BASE64
        .decode(base64_text.as_bytes())
        .map_err(|e| Error::Encoding(e.to_string()))
}
